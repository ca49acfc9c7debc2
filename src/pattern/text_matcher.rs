//! Literal and regular-expression tests on surface forms, lemmas and tags.

use regex::Regex;

use crate::error::{CompileError, full_match_regex};
use crate::reading::UNKNOWN_TAG;

/// Matches a whole string either literally or against an anchored regex.
#[derive(Debug, Clone)]
pub struct StringMatcher {
    pattern: String,
    case_sensitive: bool,
    kind: MatcherKind,
}

#[derive(Debug, Clone)]
enum MatcherKind {
    /// Lowercased copy of the pattern, used when `case_sensitive` is false.
    Literal { folded: String },
    Regex(Regex),
    /// Pattern holding a back-reference placeholder. Matches nothing until
    /// the placeholder is substituted.
    Template { is_regex: bool },
}

impl StringMatcher {
    pub fn literal(pattern: &str, case_sensitive: bool) -> Self {
        Self {
            pattern: pattern.to_string(),
            case_sensitive,
            kind: MatcherKind::Literal {
                folded: pattern.to_lowercase(),
            },
        }
    }

    pub fn regex(pattern: &str, case_sensitive: bool) -> Result<Self, CompileError> {
        Ok(Self {
            pattern: pattern.to_string(),
            case_sensitive,
            kind: MatcherKind::Regex(full_match_regex(pattern, case_sensitive)?),
        })
    }

    pub fn new(pattern: &str, is_regex: bool, case_sensitive: bool) -> Result<Self, CompileError> {
        if is_regex {
            Self::regex(pattern, case_sensitive)
        } else {
            Ok(Self::literal(pattern, case_sensitive))
        }
    }

    pub(crate) fn template(pattern: &str, is_regex: bool, case_sensitive: bool) -> Self {
        Self {
            pattern: pattern.to_string(),
            case_sensitive,
            kind: MatcherKind::Template { is_regex },
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_regex(&self) -> bool {
        matches!(
            self.kind,
            MatcherKind::Regex(_) | MatcherKind::Template { is_regex: true }
        )
    }

    pub fn is_template(&self) -> bool {
        matches!(self.kind, MatcherKind::Template { .. })
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn matches(&self, text: &str) -> bool {
        match &self.kind {
            MatcherKind::Literal { folded } => {
                if self.case_sensitive {
                    text == self.pattern
                } else {
                    text.to_lowercase() == *folded
                }
            }
            MatcherKind::Regex(re) => re.is_match(text),
            MatcherKind::Template { .. } => false,
        }
    }
}

/// Tag constraint. Tags are always compared case-sensitively.
#[derive(Debug, Clone)]
pub struct TagMatcher {
    matcher: StringMatcher,
    /// Whether the constraint also covers readings that have no tag at all.
    accepts_untagged: bool,
}

impl TagMatcher {
    pub fn new(tag: &str, is_regex: bool) -> Result<Self, CompileError> {
        let matcher = StringMatcher::new(tag, is_regex, true)?;
        let accepts_untagged = matcher.matches(UNKNOWN_TAG);
        Ok(Self {
            matcher,
            accepts_untagged,
        })
    }

    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    pub fn is_regex(&self) -> bool {
        self.matcher.is_regex()
    }

    pub fn matches(&self, tag: Option<&str>) -> bool {
        match tag {
            Some(tag) => self.matcher.matches(tag),
            None => self.accepts_untagged,
        }
    }
}

/// Escape `text` so it matches itself inside a regular expression.
pub fn escape(text: &str) -> String {
    regex::escape(text)
}
