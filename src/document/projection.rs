//! Projection of a host document onto its embedded languages.
//!
//! [`DocumentRegions`] is the cached result of one scan. It answers which
//! language governs an offset or range and builds virtual documents.

use tower_lsp::lsp_types::{Position, Range};

use super::matcher::Matchers;
use super::region::{EmbeddedRegion, LanguageRange};
use super::scanner::RegionScanner;
use super::synthesize::synthesize;
use super::text::LineIndex;

/// Regions of one document version.
#[derive(Debug)]
pub struct DocumentRegions {
    pub version: i32,
    host_language: String,
    line_index: LineIndex,
    regions: Vec<EmbeddedRegion>,
    imported_scripts: Vec<String>,
}

impl DocumentRegions {
    /// Scan `text` for embedded regions.
    pub fn scan(text: &str, version: i32, host_language: &str, matchers: &Matchers) -> Self {
        let result = RegionScanner::new(matchers).scan(text);
        Self {
            version,
            host_language: host_language.to_string(),
            line_index: LineIndex::new(text.to_string()),
            regions: result.regions,
            imported_scripts: result.imported_scripts,
        }
    }

    pub fn regions(&self) -> &[EmbeddedRegion] {
        &self.regions
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub fn host_language(&self) -> &str {
        &self.host_language
    }

    pub fn imported_scripts(&self) -> &[String] {
        &self.imported_scripts
    }

    /// Virtual document text for `language`.
    pub fn embedded_document(&self, language: &str, ignore_attribute_values: bool) -> String {
        synthesize(
            self.line_index.text(),
            &self.regions,
            language,
            ignore_attribute_values,
        )
    }

    /// Region containing `offset`, end inclusive.
    pub fn region_at(&self, offset: usize) -> Option<&EmbeddedRegion> {
        for region in &self.regions {
            if region.start > offset {
                break;
            }
            if offset <= region.end {
                return Some(region);
            }
        }
        None
    }

    /// Language governing `offset`; the host language outside every region.
    /// `None` inside a region of unrecognized language.
    pub fn language_at(&self, offset: usize) -> Option<&str> {
        match self.region_at(offset) {
            Some(region) => region.language(),
            None => Some(&self.host_language),
        }
    }

    pub fn region_at_position(&self, position: Position) -> Option<&EmbeddedRegion> {
        self.region_at(self.line_index.offset_at_clamped(position))
    }

    pub fn language_at_position(&self, position: Position) -> Option<&str> {
        self.language_at(self.line_index.offset_at_clamped(position))
    }

    /// Distinct embedded languages in order of first appearance, followed by
    /// the host language.
    pub fn languages_in_document(&self) -> Vec<&str> {
        let mut result: Vec<&str> = Vec::new();
        for language in self.regions.iter().filter_map(EmbeddedRegion::language) {
            if !result.contains(&language) {
                result.push(language);
            }
        }
        if !result.contains(&self.host_language.as_str()) {
            result.push(&self.host_language);
        }
        result
    }

    /// Split `range` into consecutive runs of host text and embedded regions.
    ///
    /// The runs cover the range end to end without gaps or overlaps; regions
    /// straddling a boundary are clipped to it.
    pub fn language_ranges(&self, range: Range) -> Vec<LanguageRange> {
        let index = &self.line_index;
        let mut result = Vec::new();
        let mut current_pos = range.start;
        let mut current = index.offset_at_clamped(range.start);
        let end_offset = index.offset_at_clamped(range.end);

        for region in &self.regions {
            if region.end <= current || region.start >= end_offset {
                continue;
            }
            let start = region.start.max(current);
            let start_pos = index.position_at(start);
            if current < region.start {
                result.push(LanguageRange {
                    start: current_pos,
                    end: start_pos,
                    language_id: Some(self.host_language.clone()),
                    is_attribute_value: false,
                });
            }
            let end = region.end.min(end_offset);
            let end_pos = index.position_at(end);
            result.push(LanguageRange {
                start: start_pos,
                end: end_pos,
                language_id: region.language_id.clone(),
                is_attribute_value: region.role.is_attribute(),
            });
            current = end;
            current_pos = end_pos;
        }

        if current < end_offset {
            result.push(LanguageRange {
                start: current_pos,
                end: range.end,
                language_id: Some(self.host_language.clone()),
                is_attribute_value: false,
            });
        }
        result
    }

    /// Runs covering the whole document.
    pub fn all_language_ranges(&self) -> Vec<LanguageRange> {
        self.language_ranges(self.line_index.full_range())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::region::RegionRole;

    const HOST: &str = "<p>\n<style>a{}</style>\n<b onclick=\"go()\">x</b>\n</p>";

    fn regions() -> DocumentRegions {
        DocumentRegions::scan(HOST, 1, "html", &Matchers::default())
    }

    #[test]
    fn language_at_offsets() {
        let doc = regions();
        let css = HOST.find("a{}").unwrap();
        let js = HOST.find("go()").unwrap();
        assert_eq!(doc.language_at(0), Some("html"));
        assert_eq!(doc.language_at(css), Some("css"));
        assert_eq!(doc.language_at(css + 3), Some("css"));
        assert_eq!(doc.language_at(js + 2), Some("javascript"));
        assert_eq!(doc.language_at(HOST.len()), Some("html"));
    }

    #[test]
    fn region_at_exposes_role() {
        let doc = regions();
        let js = HOST.find("go()").unwrap();
        let region = doc.region_at(js).unwrap();
        assert_eq!(region.role, RegionRole::AttributeValue);
        assert!(doc.region_at(0).is_none());
    }

    #[test]
    fn language_at_position() {
        let doc = regions();
        assert_eq!(doc.language_at_position(Position::new(1, 8)), Some("css"));
        assert_eq!(doc.language_at_position(Position::new(0, 1)), Some("html"));
    }

    #[test]
    fn ranges_alternate_host_and_regions() {
        let doc = regions();
        let ranges = doc.all_language_ranges();
        let languages: Vec<_> = ranges.iter().map(|r| r.language_id.as_deref().unwrap()).collect();
        assert_eq!(languages, vec!["html", "css", "html", "javascript", "html"]);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(ranges.first().unwrap().start, Position::new(0, 0));
        assert_eq!(ranges.last().unwrap().end, doc.line_index().full_range().end);
        assert!(ranges[3].is_attribute_value);
    }

    #[test]
    fn ranges_clip_to_query() {
        let doc = regions();
        // line 1 is "<style>a{}</style>", query from inside the rule to mid-line
        let range = Range::new(Position::new(1, 8), Position::new(1, 12));
        let ranges = doc.language_ranges(range);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].language_id.as_deref(), Some("css"));
        assert_eq!(ranges[0].start, Position::new(1, 8));
        assert_eq!(ranges[0].end, Position::new(1, 10));
        assert_eq!(ranges[1].language_id.as_deref(), Some("html"));
        assert_eq!(ranges[1].end, Position::new(1, 12));
    }

    #[test]
    fn languages_in_document_end_with_host() {
        let doc = regions();
        assert_eq!(doc.languages_in_document(), vec!["css", "javascript", "html"]);
        let empty = DocumentRegions::scan("<p></p>", 1, "html", &Matchers::default());
        assert_eq!(empty.languages_in_document(), vec!["html"]);
    }
}
