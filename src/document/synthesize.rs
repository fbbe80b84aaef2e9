//! Virtual document synthesis.
//!
//! A virtual document holds one language's regions at their original line and
//! column, with everything else blanked out. Newlines are copied verbatim and
//! every other character becomes spaces worth its UTF-16 width, so positions
//! reported against the virtual text are valid against the host text.

use super::region::{languages, EmbeddedRegion};

/// Selector wrapped around style attribute values so they parse as a rule.
pub const CSS_STYLE_RULE: &str = "__";

fn prefix(region: &EmbeddedRegion) -> String {
    if region.role.is_attribute() && region.language() == Some(languages::CSS) {
        return format!("{CSS_STYLE_RULE}{{");
    }
    String::new()
}

fn suffix(region: &EmbeddedRegion) -> &'static str {
    if !region.role.is_attribute() {
        return "";
    }
    match region.language() {
        Some(languages::CSS) => "}",
        Some(languages::JAVASCRIPT) => ";",
        _ => "",
    }
}

fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Blank out `host[start..end]` into `out`.
///
/// `before` is written first and `after` last; both consume blank budget so
/// the text following the gap keeps its column. Only the run after the last
/// newline of the gap is padded, earlier lines are left short. When that run
/// is narrower than `after`, `after` moves up to the end of the previous line.
fn substitute_with_whitespace(
    out: &mut String,
    host: &str,
    start: usize,
    end: usize,
    before: &str,
    after: &str,
) {
    out.push_str(before);
    let mut skip = utf16_len(before);
    let mut blank = 0usize;
    let mut line_break_at = None;
    let mut after_cr = false;
    for c in host[start..end].chars() {
        let width = c.len_utf16();
        if c == '\n' || c == '\r' {
            if !(c == '\n' && after_cr) {
                line_break_at = Some(out.len());
            }
            blank = 0;
            skip = 0;
            out.push(c);
        } else if skip > 0 {
            skip = skip.saturating_sub(width);
        } else {
            blank += width;
        }
        after_cr = c == '\r';
    }
    let after_width = utf16_len(after);
    match line_break_at {
        Some(at) if blank < after_width => {
            out.insert_str(at, after);
            out.extend(std::iter::repeat(' ').take(blank));
        }
        _ => {
            out.extend(std::iter::repeat(' ').take(blank.saturating_sub(after_width)));
            out.push_str(after);
        }
    }
}

/// Generated declarations never introduce lines of their own.
fn single_line(text: String) -> String {
    if text.contains(['\n', '\r']) {
        text.replace(['\n', '\r'], " ")
    } else {
        text
    }
}

/// Build the virtual document of `language` over `host`.
///
/// When `ignore_attribute_values` is set, attribute and directive regions are
/// left blank.
pub fn synthesize(
    host: &str,
    regions: &[EmbeddedRegion],
    language: &str,
    ignore_attribute_values: bool,
) -> String {
    let mut out = String::with_capacity(host.len());
    let mut current = 0usize;
    let mut last_suffix = "";
    let mut padding = String::new();

    for region in regions {
        if region.language() != Some(language) {
            continue;
        }
        if ignore_attribute_values && region.role.is_attribute() {
            continue;
        }
        if !padding.is_empty() && host[current..region.start].contains('\n') {
            out.push_str(&padding);
            padding.clear();
        }
        substitute_with_whitespace(&mut out, host, current, region.start, last_suffix, &prefix(region));
        let value = &host[region.start..region.end];
        out.push_str(value);
        if let Some(append) = &region.append_content {
            padding.push_str(&single_line(append.apply(value)));
        }
        current = region.end;
        last_suffix = suffix(region);
    }

    out.push_str(&padding);
    substitute_with_whitespace(&mut out, host, current, host.len(), last_suffix, "");
    out
}
