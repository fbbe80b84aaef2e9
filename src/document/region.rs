//! Embedded region types.
//!
//! A host document is partitioned into disjoint regions, each attributed to
//! one embedded language. Regions carry half-open byte offsets into the host
//! text and are regenerated on every scan.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::Position;

/// Well-known language identifiers.
pub mod languages {
    pub const HTML: &str = "html";
    pub const CSS: &str = "css";
    pub const JAVASCRIPT: &str = "javascript";
    pub const TYPESCRIPT: &str = "typescript";

    /// Whether a language id denotes a script language tracked by the module graph.
    pub fn is_script(language_id: &str) -> bool {
        matches!(language_id, JAVASCRIPT | TYPESCRIPT)
    }
}

/// How a region was discovered in the host markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegionRole {
    /// Body of a `<style>` or `<script>` element, tags excluded.
    ElementBody,
    /// Value of a `style` or `on*` attribute, quotes excluded.
    AttributeValue,
    /// Value of an attribute matched by a directive matcher.
    Directive,
    /// Sub-span reported by a content matcher.
    Content,
}

impl RegionRole {
    /// Attribute-like regions are wrapped with a prefix/suffix when synthesized
    /// and are skipped when attribute values are ignored.
    pub fn is_attribute(&self) -> bool {
        matches!(self, RegionRole::AttributeValue | RegionRole::Directive)
    }
}

/// Generates extra declarations from a directive's raw attribute text.
///
/// The generated text is appended to the virtual document after the region,
/// at the next line boundary.
#[derive(Clone)]
pub struct AppendContent(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl AppendContent {
    pub fn new(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, raw: &str) -> String {
        (self.0)(raw)
    }
}

impl fmt::Debug for AppendContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppendContent(..)")
    }
}

/// A contiguous span of the host document attributed to one language.
#[derive(Debug, Clone)]
pub struct EmbeddedRegion {
    /// Language of the span. `None` for script elements of unrecognized type.
    pub language_id: Option<String>,
    /// Byte offset where the region starts.
    pub start: usize,
    /// Byte offset one past the end of the region.
    pub end: usize,
    pub role: RegionRole,
    pub append_content: Option<AppendContent>,
}

impl EmbeddedRegion {
    pub fn new(language_id: Option<&str>, start: usize, end: usize, role: RegionRole) -> Self {
        Self {
            language_id: language_id.map(str::to_string),
            start,
            end,
            role,
            append_content: None,
        }
    }

    pub fn with_append_content(mut self, append: Option<AppendContent>) -> Self {
        self.append_content = append;
        self
    }

    pub fn language(&self) -> Option<&str> {
        self.language_id.as_deref()
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Containment with an inclusive end, so a cursor sitting right after the
    /// last character still belongs to the region.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }
}

/// Position-based projection of a run of host text onto one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageRange {
    pub start: Position,
    pub end: Position,
    pub language_id: Option<String>,
    pub is_attribute_value: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_end_inclusive() {
        let region = EmbeddedRegion::new(Some(languages::CSS), 7, 20, RegionRole::ElementBody);
        assert!(!region.contains(6));
        assert!(region.contains(7));
        assert!(region.contains(20));
        assert!(!region.contains(21));
    }

    #[test]
    fn attribute_roles() {
        assert!(RegionRole::AttributeValue.is_attribute());
        assert!(RegionRole::Directive.is_attribute());
        assert!(!RegionRole::ElementBody.is_attribute());
        assert!(!RegionRole::Content.is_attribute());
    }

    #[test]
    fn append_content_applies_closure() {
        let append = AppendContent::new(|raw| format!("let {};", raw.trim()));
        assert_eq!(append.apply(" item "), "let item;");
    }

    #[test]
    fn script_languages() {
        assert!(languages::is_script("javascript"));
        assert!(languages::is_script("typescript"));
        assert!(!languages::is_script("css"));
    }
}
