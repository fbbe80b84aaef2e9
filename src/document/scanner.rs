//! Markup token stream and embedded region scanner.
//!
//! Host markup is parsed with tree-sitter-html and flattened into a stream
//! of tag, attribute and text tokens. The region scanner consumes that
//! stream and records every span that belongs to an embedded language.

use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::{Node, Parser};

use super::matcher::Matchers;
use super::region::{languages, EmbeddedRegion, RegionRole};

/// Kind of a markup token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    StartTagOpen,
    StartTag,
    StartTagClose,
    StartTagSelfClose,
    EndTagOpen,
    EndTag,
    EndTagClose,
    AttributeName,
    DelimiterAssign,
    /// Attribute value, quotes included.
    AttributeValue,
    /// A run of text between tags.
    Content,
    Comment,
    Doctype,
    /// Body of a `<style>` element.
    Styles,
    /// Body of a `<script>` element.
    Script,
    /// Any other leaf, such as punctuation left over by error recovery.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// Parse `text` and flatten the syntax tree into tokens in document order.
///
/// Malformed input never fails: the parser recovers, and the leaves of its
/// error nodes still come through as tokens. Without a tree the stream is
/// empty.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&tree_sitter_html::LANGUAGE.into()) {
        tracing::warn!(error = %e, "failed to load markup grammar");
        return Vec::new();
    }
    let Some(tree) = parser.parse(text, None) else {
        return Vec::new();
    };

    let mut tokens: Vec<Token> = Vec::new();
    let mut cursor = tree.walk();
    'walk: loop {
        let node = cursor.node();
        // Recovered nodes inserted by the parser have no text of their own.
        let descend = !node.is_missing()
            && match token_kind(&node, text) {
                Some(kind) => {
                    push_token(&mut tokens, kind, node.start_byte(), node.end_byte());
                    false
                }
                None => true,
            };
        if descend && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                continue 'walk;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }
    tokens
}

/// Adjacent text and entity nodes form one content run.
fn push_token(tokens: &mut Vec<Token>, kind: TokenKind, start: usize, end: usize) {
    if kind == TokenKind::Content {
        if let Some(last) = tokens.last_mut().filter(|t| t.kind == TokenKind::Content) {
            last.end = end;
            return;
        }
    }
    tokens.push(Token { kind, start, end });
}

fn parent_kind(node: &Node) -> &'static str {
    node.parent().map(|p| p.kind()).unwrap_or("")
}

/// Raw text belongs to the element whose start tag precedes it. An
/// unterminated element leaves both under an error node.
fn raw_text_kind(node: &Node, text: &str) -> TokenKind {
    match parent_kind(node) {
        "style_element" => return TokenKind::Styles,
        "script_element" => return TokenKind::Script,
        _ => {}
    }
    let tag = node
        .prev_sibling()
        .filter(|prev| prev.kind() == "start_tag")
        .and_then(|start_tag| {
            let mut cursor = start_tag.walk();
            let name = start_tag
                .children(&mut cursor)
                .find(|child| child.kind() == "tag_name");
            name
        })
        .and_then(|name| text.get(name.byte_range()));
    match tag {
        Some(tag) if tag.eq_ignore_ascii_case("style") => TokenKind::Styles,
        Some(tag) if tag.eq_ignore_ascii_case("script") => TokenKind::Script,
        _ => TokenKind::Unknown,
    }
}

/// Token for a node that is consumed whole, or `None` to walk its children.
fn token_kind(node: &Node, text: &str) -> Option<TokenKind> {
    let kind = match node.kind() {
        "tag_name" => match parent_kind(node) {
            "start_tag" | "self_closing_tag" => TokenKind::StartTag,
            _ => TokenKind::EndTag,
        },
        "attribute_name" => TokenKind::AttributeName,
        "attribute_value" | "quoted_attribute_value" => TokenKind::AttributeValue,
        "raw_text" => raw_text_kind(node, text),
        "text" | "entity" => TokenKind::Content,
        "comment" => TokenKind::Comment,
        "doctype" => TokenKind::Doctype,
        "<" => TokenKind::StartTagOpen,
        "</" => TokenKind::EndTagOpen,
        "=" => TokenKind::DelimiterAssign,
        "/>" => TokenKind::StartTagSelfClose,
        ">" => match parent_kind(node) {
            "start_tag" => TokenKind::StartTagClose,
            "end_tag" | "erroneous_end_tag" => TokenKind::EndTagClose,
            _ => TokenKind::Unknown,
        },
        _ if node.child_count() == 0 => TokenKind::Unknown,
        _ => return None,
    };
    Some(kind)
}

static JAVASCRIPT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^["']?(module|(text|application)/(java|ecma)script|text/babel)["']?$"#).unwrap()
});

static TYPESCRIPT_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^["']?text/typescript["']?$"#).unwrap());

static ATTRIBUTE_LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(style)$|^(on\w+)$").unwrap());

/// Language selected by a `<script type="...">` value, `None` when the type
/// names no embedded language.
fn script_language_from_type(raw_value: &str) -> Option<&'static str> {
    if JAVASCRIPT_TYPE.is_match(raw_value) {
        Some(languages::JAVASCRIPT)
    } else if TYPESCRIPT_TYPE.is_match(raw_value) {
        Some(languages::TYPESCRIPT)
    } else {
        None
    }
}

/// Language of a built-in attribute: `style` holds style, `on*` holds script.
fn attribute_language(attribute_name: &str) -> Option<&'static str> {
    let caps = ATTRIBUTE_LANGUAGE.captures(attribute_name)?;
    if caps.get(1).is_some() {
        Some(languages::CSS)
    } else {
        Some(languages::JAVASCRIPT)
    }
}

fn is_quote(b: u8) -> bool {
    b == b'"' || b == b'\''
}

/// Span of an attribute value with its surrounding quotes removed.
fn unquoted_span(text: &str, token: &Token) -> (usize, usize, bool) {
    let bytes = text.as_bytes();
    let (mut start, mut end) = (token.start, token.end);
    let quoted = bytes.get(start).copied().is_some_and(is_quote);
    if quoted {
        start += 1;
        if end > start && bytes.get(end - 1) == bytes.get(token.start) {
            end -= 1;
        }
    }
    (start, end, quoted)
}

/// Where the region scanner stands in the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState<'t> {
    /// Between tags.
    Content,
    /// Inside a start tag, after its name.
    StartTag {
        tag: &'t str,
        attribute: Option<&'t str>,
        script_language: Option<&'static str>,
    },
    /// After a start tag's `>`, before its body.
    Body { script_language: Option<&'static str> },
}

/// Output of a region scan.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Regions in document order, disjoint and non-empty.
    pub regions: Vec<EmbeddedRegion>,
    /// `src` values of script elements.
    pub imported_scripts: Vec<String>,
}

/// Scans host markup for embedded regions.
pub struct RegionScanner<'m> {
    matchers: &'m Matchers,
}

impl<'m> RegionScanner<'m> {
    pub fn new(matchers: &'m Matchers) -> Self {
        Self { matchers }
    }

    pub fn scan(&self, text: &str) -> ScanResult {
        let mut result = ScanResult::default();
        let mut state = ScanState::Content;

        for token in tokenize(text) {
            state = match (token.kind, state) {
                (TokenKind::StartTag, _) => ScanState::StartTag {
                    tag: &text[token.start..token.end],
                    attribute: None,
                    script_language: Some(languages::JAVASCRIPT),
                },
                (
                    TokenKind::AttributeName,
                    ScanState::StartTag {
                        tag,
                        script_language,
                        ..
                    },
                ) => ScanState::StartTag {
                    tag,
                    attribute: Some(&text[token.start..token.end]),
                    script_language,
                },
                (
                    TokenKind::AttributeValue,
                    ScanState::StartTag {
                        tag,
                        attribute: Some(attribute),
                        script_language,
                    },
                ) => {
                    let script_language =
                        self.on_attribute_value(text, &token, tag, attribute, script_language, &mut result);
                    ScanState::StartTag {
                        tag,
                        attribute: None,
                        script_language,
                    }
                }
                (TokenKind::StartTagClose, ScanState::StartTag { script_language, .. }) => {
                    ScanState::Body { script_language }
                }
                (TokenKind::Styles, _) => {
                    result.regions.push(EmbeddedRegion::new(
                        Some(languages::CSS),
                        token.start,
                        token.end,
                        RegionRole::ElementBody,
                    ));
                    ScanState::Content
                }
                (TokenKind::Script, state) => {
                    let language = match state {
                        ScanState::Body { script_language } => script_language,
                        _ => Some(languages::JAVASCRIPT),
                    };
                    result.regions.push(EmbeddedRegion::new(
                        language,
                        token.start,
                        token.end,
                        RegionRole::ElementBody,
                    ));
                    ScanState::Content
                }
                (TokenKind::Content, _) => {
                    self.push_content_regions(text, token.start, token.end, &mut result.regions);
                    ScanState::Content
                }
                (
                    TokenKind::DelimiterAssign | TokenKind::Unknown,
                    state @ ScanState::StartTag { .. },
                ) => state,
                // A value with no attribute name before it claims nothing.
                (TokenKind::AttributeValue, state) => state,
                _ => ScanState::Content,
            };
        }

        result.regions = normalize(result.regions, text);
        result
    }

    /// Handles one attribute value and returns the script language the
    /// enclosing tag selects afterwards.
    fn on_attribute_value(
        &self,
        text: &str,
        token: &Token,
        tag: &str,
        attribute: &str,
        script_language: Option<&'static str>,
        result: &mut ScanResult,
    ) -> Option<&'static str> {
        let raw = &text[token.start..token.end];
        let is_script_tag = tag.eq_ignore_ascii_case("script");

        if is_script_tag && attribute == "src" {
            let (start, end, _) = unquoted_span(text, token);
            result.imported_scripts.push(text[start..end].to_string());
            return script_language;
        }
        if is_script_tag && attribute == "type" {
            return script_language_from_type(raw);
        }

        let (start, end, quoted) = unquoted_span(text, token);
        if let Some(language) = attribute_language(attribute) {
            result.regions.push(EmbeddedRegion::new(
                Some(language),
                start,
                end,
                RegionRole::AttributeValue,
            ));
        } else if let Some(directive) = self.matchers.directive_for(attribute) {
            if quoted {
                result.regions.push(
                    EmbeddedRegion::new(Some(&directive.language), start, end, RegionRole::Directive)
                        .with_append_content(directive.append_content.clone()),
                );
            }
        } else if self.matchers.scan_attribute_values {
            self.push_content_regions(text, start, end, &mut result.regions);
        }
        script_language
    }

    fn push_content_regions(&self, text: &str, start: usize, end: usize, regions: &mut Vec<EmbeddedRegion>) {
        let span = &text[start..end];
        for matcher in &self.matchers.contents {
            for range in matcher.find(span) {
                regions.push(EmbeddedRegion::new(
                    Some(&matcher.language),
                    start + range.start,
                    start + range.end,
                    RegionRole::Content,
                ));
            }
        }
    }
}

/// Sort regions, drop empty or overlapping ones and clamp to the text.
///
/// Regions must start and end on char boundaries; content matchers are free
/// to return any byte range, so the ones that split a character are dropped.
fn normalize(mut regions: Vec<EmbeddedRegion>, text: &str) -> Vec<EmbeddedRegion> {
    regions.sort_by_key(|r| r.start);
    let mut out: Vec<EmbeddedRegion> = Vec::with_capacity(regions.len());
    for mut region in regions {
        region.end = region.end.min(text.len());
        if region.end <= region.start {
            continue;
        }
        if !text.is_char_boundary(region.start) || !text.is_char_boundary(region.end) {
            tracing::debug!(
                start = region.start,
                end = region.end,
                "dropping region that splits a character"
            );
            continue;
        }
        if out.last().is_some_and(|prev| region.start < prev.end) {
            continue;
        }
        out.push(region);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::matcher::{ContentMatcher, Directive};

    fn kinds(text: &str) -> Vec<(TokenKind, &str)> {
        tokenize(text)
            .into_iter()
            .map(|token| (token.kind, &text[token.start..token.end]))
            .collect()
    }

    fn spans<'a>(text: &'a str, result: &'a ScanResult) -> Vec<(Option<&'a str>, &'a str, RegionRole)> {
        result
            .regions
            .iter()
            .map(|r| (r.language(), &text[r.span()], r.role))
            .collect()
    }

    fn scan(text: &str) -> ScanResult {
        RegionScanner::new(&Matchers::default()).scan(text)
    }

    #[test]
    fn tokenizes_tags_and_attributes() {
        let tokens = kinds(r#"<div class="a" hidden>x</div>"#);
        assert_eq!(
            tokens,
            vec![
                (TokenKind::StartTagOpen, "<"),
                (TokenKind::StartTag, "div"),
                (TokenKind::AttributeName, "class"),
                (TokenKind::DelimiterAssign, "="),
                (TokenKind::AttributeValue, "\"a\""),
                (TokenKind::AttributeName, "hidden"),
                (TokenKind::StartTagClose, ">"),
                (TokenKind::Content, "x"),
                (TokenKind::EndTagOpen, "</"),
                (TokenKind::EndTag, "div"),
                (TokenKind::EndTagClose, ">"),
            ]
        );
    }

    #[test]
    fn tokenizes_script_body_as_one_token() {
        let tokens = kinds("<script>if (a < b) {}</SCRIPT>");
        assert_eq!(tokens[3], (TokenKind::Script, "if (a < b) {}"));
        assert_eq!(tokens[5], (TokenKind::EndTag, "SCRIPT"));
    }

    #[test]
    fn comments_and_doctype() {
        let tokens = kinds("<!DOCTYPE html><!-- <style>x</style> -->");
        assert_eq!(tokens[0].0, TokenKind::Doctype);
        assert_eq!(tokens[1], (TokenKind::Comment, "<!-- <style>x</style> -->"));
    }

    #[test]
    fn style_element_body() {
        let text = "<style>.a{color:red}</style>";
        let result = scan(text);
        assert_eq!(
            spans(text, &result),
            vec![(Some("css"), ".a{color:red}", RegionRole::ElementBody)]
        );
    }

    #[test]
    fn script_type_selects_language() {
        let text = concat!(
            "<script>a</script>",
            "<script type=\"module\">b</script>",
            "<script type='text/typescript'>c</script>",
            "<script type=\"text/template\">d</script>",
        );
        let result = scan(text);
        let languages: Vec<_> = spans(text, &result).into_iter().map(|(l, s, _)| (l, s)).collect();
        assert_eq!(
            languages,
            vec![
                (Some("javascript"), "a"),
                (Some("javascript"), "b"),
                (Some("typescript"), "c"),
                (None, "d"),
            ]
        );
    }

    #[test]
    fn style_and_event_attributes_exclude_quotes() {
        let text = r#"<div style="color:blue" onclick='go()' ONLOAD=init()></div>"#;
        let result = scan(text);
        assert_eq!(
            spans(text, &result),
            vec![
                (Some("css"), "color:blue", RegionRole::AttributeValue),
                (Some("javascript"), "go()", RegionRole::AttributeValue),
                (Some("javascript"), "init()", RegionRole::AttributeValue),
            ]
        );
    }

    #[test]
    fn imported_scripts_are_unquoted() {
        let result = scan(r#"<script src="./app.js"></script><script src='lib.js'></script>"#);
        assert_eq!(result.imported_scripts, vec!["./app.js", "lib.js"]);
        assert!(result.regions.is_empty());
    }

    #[test]
    fn directive_regions_carry_append_content() {
        let matchers = Matchers {
            directives: vec![Directive::pattern(Regex::new("^k-").unwrap(), "javascript")
                .with_append_content(|_| "let x;".into())],
            ..Default::default()
        };
        let text = r#"<li k-for="x in xs" k-bad=unquoted></li>"#;
        let result = RegionScanner::new(&matchers).scan(text);
        assert_eq!(result.regions.len(), 1);
        let region = &result.regions[0];
        assert_eq!(&text[region.span()], "x in xs");
        assert_eq!(region.role, RegionRole::Directive);
        assert_eq!(region.append_content.as_ref().unwrap().apply("x in xs"), "let x;");
    }

    #[test]
    fn content_matchers_scan_text_and_unclaimed_attributes() {
        let matchers = Matchers {
            contents: vec![ContentMatcher::pattern(Regex::new(r"\{\{(.*?)\}\}").unwrap(), "javascript")],
            scan_attribute_values: true,
            ..Default::default()
        };
        let text = r#"<p title="{{t}}">Hi {{ name }}!</p>"#;
        let result = RegionScanner::new(&matchers).scan(text);
        assert_eq!(
            spans(text, &result),
            vec![
                (Some("javascript"), "t", RegionRole::Content),
                (Some("javascript"), " name ", RegionRole::Content),
            ]
        );
    }

    #[test]
    fn attribute_values_ignored_without_hook() {
        let matchers = Matchers {
            contents: vec![ContentMatcher::pattern(Regex::new(r"\{\{(.*?)\}\}").unwrap(), "javascript")],
            ..Default::default()
        };
        let text = r#"<p title="{{t}}"></p>"#;
        assert!(RegionScanner::new(&matchers).scan(text).regions.is_empty());
    }

    #[test]
    fn unterminated_markup_is_tolerated() {
        let text = "<style>.a{}\n<div style=\"x";
        let result = scan(text);
        assert_eq!(result.regions.len(), 1);
        assert_eq!(&text[result.regions[0].span()], ".a{}\n<div style=\"x");

        for text in ["<div onclick=\"a()", "<p a=\"x\" <b>", "</", "<div style=", "<script type="] {
            let result = scan(text);
            assert!(result.regions.iter().all(|r| r.start < r.end && r.end <= text.len()));
        }
    }

    #[test]
    fn regions_splitting_a_character_are_dropped() {
        let matchers = Matchers {
            contents: vec![ContentMatcher::new("javascript", |_| vec![1..2])],
            ..Default::default()
        };
        let text = "<p>é</p>";
        let result = RegionScanner::new(&matchers).scan(text);
        assert!(result.regions.is_empty());
        let out = crate::document::synthesize(text, &result.regions, "javascript", false);
        assert!(out.trim().is_empty());
    }

    #[test]
    fn entities_join_the_surrounding_text() {
        let tokens = kinds("<p>a &amp; b</p>");
        assert_eq!(tokens[3], (TokenKind::Content, "a &amp; b"));
    }

    #[test]
    fn empty_values_produce_no_region() {
        let result = scan(r#"<div style="" onclick=''></div><script></script>"#);
        assert!(result.regions.is_empty());
    }

    #[test]
    fn regions_are_sorted_and_disjoint() {
        let text = "<style>a{}</style><div style=\"b:c\"></div><script>d()</script>";
        let result = scan(text);
        for pair in result.regions.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        assert!(result.regions.iter().all(|r| r.end > r.start && r.end <= text.len()));
    }
}
