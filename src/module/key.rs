//! Canonical module keys.
//!
//! A key is the normalized identity of a module. Documents are keyed by their
//! uri; import specifiers are resolved against the importing module's key.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tower_lsp::lsp_types::Url;

/// Namespace holding declarations for bare (package) specifiers.
pub const TYPES_NAMESPACE: &str = "file:///node_modules/@types/";

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn is_relative(specifier: &str) -> bool {
    ["./", ".\\", "../", "..\\"]
        .iter()
        .any(|prefix| specifier.starts_with(prefix))
}

/// Whether the last path segment of a specifier has a file extension.
pub fn has_extension(specifier: &str) -> bool {
    let name = specifier.rsplit(['/', '\\']).next().unwrap_or(specifier);
    name.find('.').is_some_and(|i| i >= 1)
}

/// Key of an open document.
pub fn document_key(uri: &Url) -> String {
    uri.to_string()
}

/// Resolve `specifier` imported from the module keyed `importer`.
///
/// Relative and rooted specifiers are joined to the importer's directory with
/// `.`/`..` segments normalized. Absolute urls are kept. Anything else is a
/// package name and maps into [`TYPES_NAMESPACE`].
pub fn module_key(specifier: &str, importer: &str) -> Option<String> {
    let specifier = specifier.trim();
    if specifier.is_empty() {
        return None;
    }
    if is_relative(specifier) || specifier.starts_with('/') {
        let base = Url::parse(importer).ok()?;
        return base
            .join(&specifier.replace('\\', "/"))
            .ok()
            .map(|url| url.to_string());
    }
    if let Ok(url) = Url::parse(specifier) {
        return Some(url.to_string());
    }
    Some(format!("{TYPES_NAMESPACE}{specifier}/index.d.ts"))
}

/// Percent-encoded form of a key, when it differs from the key.
///
/// Declarations are published under both forms so either spelling resolves.
pub fn encoded_alias(key: &str) -> Option<String> {
    let encoded = utf8_percent_encode(key, COMPONENT).to_string();
    (encoded != key).then_some(encoded)
}
