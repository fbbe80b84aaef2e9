//! Directive and content matchers consulted while scanning host markup.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use regex::Regex;

use super::region::AppendContent;

/// Matches an attribute name, either exactly or by pattern.
#[derive(Debug, Clone)]
pub enum AttributeMatcher {
    Exact(String),
    Pattern(Regex),
}

impl AttributeMatcher {
    pub fn is_match(&self, attribute_name: &str) -> bool {
        match self {
            AttributeMatcher::Exact(name) => name == attribute_name,
            AttributeMatcher::Pattern(re) => re.is_match(attribute_name),
        }
    }
}

/// Maps a custom attribute to an embedded language.
#[derive(Debug, Clone)]
pub struct Directive {
    pub matcher: AttributeMatcher,
    pub language: String,
    pub append_content: Option<AppendContent>,
}

impl Directive {
    pub fn exact(name: &str, language: &str) -> Self {
        Self {
            matcher: AttributeMatcher::Exact(name.to_string()),
            language: language.to_string(),
            append_content: None,
        }
    }

    pub fn pattern(re: Regex, language: &str) -> Self {
        Self {
            matcher: AttributeMatcher::Pattern(re),
            language: language.to_string(),
            append_content: None,
        }
    }

    pub fn with_append_content(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.append_content = Some(AppendContent::new(f));
        self
    }
}

type SpanFinder = Arc<dyn Fn(&str) -> Vec<Range<usize>> + Send + Sync>;

/// Scans a text span for sub-ranges belonging to an embedded language,
/// such as `{{ expr }}` interpolations.
#[derive(Clone)]
pub struct ContentMatcher {
    finder: SpanFinder,
    pub language: String,
}

impl ContentMatcher {
    pub fn new(
        language: &str,
        finder: impl Fn(&str) -> Vec<Range<usize>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            finder: Arc::new(finder),
            language: language.to_string(),
        }
    }

    /// Build a matcher from a regex. Capture group 1 delimits the span when
    /// present, otherwise the whole match does.
    pub fn pattern(re: Regex, language: &str) -> Self {
        Self::new(language, move |text| {
            re.captures_iter(text)
                .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| m.range())
                .collect()
        })
    }

    /// Ranges relative to the start of `text`.
    pub fn find(&self, text: &str) -> Vec<Range<usize>> {
        (self.finder)(text)
    }
}

impl fmt::Debug for ContentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentMatcher")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

/// The matcher registration for a session.
#[derive(Debug, Clone, Default)]
pub struct Matchers {
    pub directives: Vec<Directive>,
    pub contents: Vec<ContentMatcher>,
    /// Also run content matchers over attribute values no other rule claimed.
    pub scan_attribute_values: bool,
}

impl Matchers {
    /// First directive matching the attribute, in registration order.
    pub fn directive_for(&self, attribute_name: &str) -> Option<&Directive> {
        self.directives
            .iter()
            .find(|d| d.matcher.is_match(attribute_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_directive_wins() {
        let matchers = Matchers {
            directives: vec![
                Directive::pattern(Regex::new("^k-").unwrap(), "javascript"),
                Directive::exact("k-for", "typescript"),
            ],
            ..Default::default()
        };
        let directive = matchers.directive_for("k-for").unwrap();
        assert_eq!(directive.language, "javascript");
        assert!(matchers.directive_for("class").is_none());
    }

    #[test]
    fn content_pattern_prefers_group_one() {
        let matcher = ContentMatcher::pattern(Regex::new(r"\{\{(.*?)\}\}").unwrap(), "javascript");
        assert_eq!(matcher.find("a {{ x }} b {{y}}"), vec![4..7, 14..15]);
    }

    #[test]
    fn content_pattern_without_group_uses_whole_match() {
        let matcher = ContentMatcher::pattern(Regex::new(r"@\w+").unwrap(), "javascript");
        assert_eq!(matcher.find("hi @name"), vec![3..8]);
    }
}
