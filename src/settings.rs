//! Settings infrastructure for htmlsp.
//!
//! Settings are read from an `htmlsp.toml` file describing the host language,
//! which virtual documents to publish, directive and content matchers, and
//! how script modules are resolved.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::document::{languages, ContentMatcher, Directive, Matchers};
use crate::error::{Error, Result};
use crate::module::{FsLoader, GraphOptions, LoaderOptions};

/// File name searched for by [`discover_settings`].
pub const SETTINGS_FILE: &str = "htmlsp.toml";

/// Root settings structure loaded from htmlsp.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Language of text outside every embedded region (default: html).
    pub host_language: Option<String>,

    /// Languages whose virtual documents are pushed to the client.
    pub virtual_languages: Option<Vec<String>>,

    /// Directive matchers, consulted in order.
    #[serde(default)]
    pub directives: Vec<DirectiveSettings>,

    /// Content matchers.
    #[serde(default)]
    pub contents: Vec<ContentSettings>,

    /// Script module resolution.
    pub modules: Option<ModuleSettings>,
}

/// A custom attribute mapped to an embedded language.
#[derive(Debug, Default, Deserialize)]
pub struct DirectiveSettings {
    /// Exact attribute name.
    pub attribute: Option<String>,

    /// Regex over the attribute name, used when `attribute` is absent.
    pub pattern: Option<String>,

    pub language: String,

    /// Template for text appended after the region, expanded with the
    /// captures of `append_capture` (`$1`, `${name}`).
    pub append: Option<String>,

    /// Regex applied to the raw attribute value. Without one, `$1` is the
    /// whole value.
    pub append_capture: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContentSettings {
    /// Regex locating spans; capture group 1 delimits the span if present.
    pub pattern: String,

    pub language: String,

    /// Also scan attribute values no other rule claimed.
    #[serde(default)]
    pub attribute_values: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModuleSettings {
    /// Quiet period after an edit before imports are re-resolved (default: 1000).
    pub debounce_ms: Option<u64>,

    /// Skip relative specifiers without a file extension.
    pub only_emit_for_extensioned: Option<bool>,

    /// Let an edit retry dependencies that previously failed to load.
    pub retry_failed_on_edit: Option<bool>,

    /// Directory holding package declarations, relative to the settings file.
    pub types_root: Option<PathBuf>,
}

impl Settings {
    pub fn host_language(&self) -> &str {
        self.host_language.as_deref().unwrap_or(languages::HTML)
    }

    pub fn virtual_languages(&self) -> Vec<String> {
        match &self.virtual_languages {
            Some(langs) => langs.clone(),
            None => vec![languages::CSS.to_string(), languages::JAVASCRIPT.to_string()],
        }
    }

    /// Build the matcher registration, skipping entries that fail to compile.
    pub fn matchers(&self) -> Matchers {
        let mut matchers = Matchers::default();
        for directive in &self.directives {
            match directive.build() {
                Ok(d) => matchers.directives.push(d),
                Err(e) => tracing::warn!(error = %e, "ignoring directive"),
            }
        }
        for content in &self.contents {
            match compile(&content.pattern) {
                Ok(re) => {
                    matchers.scan_attribute_values |= content.attribute_values;
                    matchers
                        .contents
                        .push(ContentMatcher::pattern(re, &content.language));
                }
                Err(e) => tracing::warn!(error = %e, "ignoring content matcher"),
            }
        }
        matchers
    }

    pub fn graph_options(&self) -> GraphOptions {
        let defaults = GraphOptions::default();
        let Some(modules) = &self.modules else {
            return defaults;
        };
        GraphOptions {
            debounce: modules
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            retry_failed_on_edit: modules
                .retry_failed_on_edit
                .unwrap_or(defaults.retry_failed_on_edit),
        }
    }

    /// The filesystem loader, with `types_root` resolved against `settings_dir`.
    pub fn loader_options(&self, settings_dir: &Path) -> LoaderOptions {
        let modules = self.modules.as_ref();
        let types_root = modules.and_then(|m| m.types_root.as_ref()).map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                settings_dir.join(path)
            }
        });
        LoaderOptions::new(FsLoader::new(types_root)).only_emit_for_extensioned(
            modules
                .and_then(|m| m.only_emit_for_extensioned)
                .unwrap_or(false),
        )
    }
}

impl DirectiveSettings {
    fn build(&self) -> Result<Directive> {
        let directive = match (&self.attribute, &self.pattern) {
            (Some(name), _) => Directive::exact(name, &self.language),
            (None, Some(pattern)) => Directive::pattern(compile(pattern)?, &self.language),
            (None, None) => {
                return Err(Error::InvalidSettings(format!(
                    "directive for '{}' needs an attribute or a pattern",
                    self.language
                )))
            }
        };
        let Some(template) = self.append.clone() else {
            return Ok(directive);
        };
        let capture = compile(self.append_capture.as_deref().unwrap_or(r"(?s)^(.*)$"))?;
        Ok(directive.with_append_content(move |raw| expand(&capture, &template, raw)))
    }
}

/// Expand `template` with the captures of `re` on `raw`; empty when `re`
/// does not match.
fn expand(re: &Regex, template: &str, raw: &str) -> String {
    let mut out = String::new();
    if let Some(caps) = re.captures(raw) {
        caps.expand(template, &mut out);
    }
    out
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Load settings from a specific path.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_settings(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse settings");
            Settings::default()
        }),
        Err(_) => Settings::default(),
    }
}

pub fn parse_settings(content: &str) -> Result<Settings> {
    Ok(toml::from_str(content)?)
}

/// Discover htmlsp.toml by searching up the directory tree, then direct children.
///
/// Search order:
/// 1. Walk up from `start_dir` to filesystem root
/// 2. If not found, check immediate child directories of `start_dir`
///
/// Returns `(settings, settings_dir)` where `settings_dir` is the directory
/// containing the found file (used for resolving relative paths).
/// If not found, returns `(Settings::default(), start_dir)`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    if let Ok(entries) = std::fs::read_dir(start_dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let candidate = entry.path().join(SETTINGS_FILE);
                if candidate.is_file() {
                    return (load_settings(&candidate), entry.path());
                }
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}
