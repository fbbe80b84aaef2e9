//! Line index for host and virtual documents.
//!
//! Region offsets are UTF-8 byte offsets; LSP positions are line/column pairs
//! counted in UTF-16 code units. `LineIndex` converts between the two.

use tower_lsp::lsp_types::{Position, Range};

/// Line start table over a document's text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset where each line starts.
    line_starts: Vec<usize>,
    text: String,
}

impl LineIndex {
    pub fn new(text: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { line_starts, text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of `\n`-delimited lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    fn line_bounds(&self, line: usize) -> (usize, usize) {
        let start = self.line_starts[line];
        let end = self
            .line_starts
            .get(line + 1)
            .map(|&next| next - 1)
            .unwrap_or(self.text.len());
        (start, end)
    }

    /// Convert a byte offset to a position. Offsets past the end clamp to the
    /// end of the document.
    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let (line_start, _) = self.line_bounds(line);
        let character = self.text[line_start..]
            .char_indices()
            .take_while(|(i, _)| line_start + i < offset)
            .map(|(_, c)| c.len_utf16() as u32)
            .sum();
        Position::new(line as u32, character)
    }

    /// Convert a position to a byte offset, or `None` when the line does not exist.
    /// Columns past the end of a line resolve to the line end.
    pub fn offset_at(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        if line >= self.line_starts.len() {
            return None;
        }
        let (line_start, line_end) = self.line_bounds(line);
        let mut column = 0u32;
        for (i, c) in self.text[line_start..line_end].char_indices() {
            if column >= position.character {
                return Some(line_start + i);
            }
            column += c.len_utf16() as u32;
        }
        Some(line_end)
    }

    /// Like [`offset_at`](Self::offset_at) but clamps lines past the end to
    /// the document length.
    pub fn offset_at_clamped(&self, position: Position) -> usize {
        self.offset_at(position).unwrap_or(self.text.len())
    }

    /// Range covering the whole document.
    pub fn full_range(&self) -> Range {
        Range::new(Position::new(0, 0), self.position_at(self.text.len()))
    }
}
