//! Compiled single-position constraints.
//!
//! A [`MatchElement`] is immutable once built and is shared read-only by
//! every match attempt of the rule that owns it.

use crate::error::{CompileError, full_match_regex};
use crate::format::MatchFormatter;
use crate::reading::Reading;
use crate::token::Token;
use crate::unifier::UnifyFeatures;

use super::text_matcher::{StringMatcher, TagMatcher};

/// Largest explicit skip or occurrence count a rule may declare.
pub const MAX_COUNT: i32 = 127;

/// How many optional tokens may precede the token an element matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Skip {
    /// Exact adjacency.
    #[default]
    None,
    /// Up to n tokens may be skipped, nearest first.
    UpTo(usize),
    /// Any number of tokens up to the end of the sentence.
    Unbounded,
}

impl Skip {
    /// Convert the rule-file count (-1 = unbounded) into a [`Skip`].
    pub fn from_count(count: i32) -> Result<Self, CompileError> {
        match count {
            -1 => Ok(Self::Unbounded),
            0 => Ok(Self::None),
            1..=MAX_COUNT => Ok(Self::UpTo(count as usize)),
            _ => Err(CompileError::InvalidSkip(count)),
        }
    }

    /// Number of tokens that may be skipped when `available` tokens remain
    /// after the first candidate.
    pub fn width(&self, available: usize) -> usize {
        match self {
            Self::None => 0,
            Self::UpTo(n) => (*n).min(available),
            Self::Unbounded => available,
        }
    }
}

/// How many consecutive tokens an element consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    /// 0 (element may be omitted) or 1.
    pub min: usize,
    /// `None` for unbounded repetition.
    pub max: Option<usize>,
}

impl Default for Occurrence {
    fn default() -> Self {
        Self {
            min: 1,
            max: Some(1),
        }
    }
}

impl Occurrence {
    pub fn new(min: u8, max: i32) -> Result<Self, CompileError> {
        let bad = || CompileError::InvalidOccurrence { min, max };
        if min > 1 {
            return Err(bad());
        }
        let max = match max {
            -1 => None,
            1..=MAX_COUNT => Some(max as usize),
            _ => return Err(bad()),
        };
        Ok(Self {
            min: min as usize,
            max,
        })
    }

    pub fn is_optional(&self) -> bool {
        self.min == 0
    }

    pub fn is_repeated(&self) -> bool {
        self.max != Some(1)
    }
}

/// Reference to the token matched by an earlier element of the same rule.
///
/// Before the owning element is tested, the referenced token is formatted
/// with `formatter` and substituted into the element: into the tag
/// constraint when the formatter sets a tag, otherwise in place of the
/// `\N` placeholder (N = `index`) in the string pattern.
#[derive(Debug, Clone)]
pub struct BackReference {
    pub index: usize,
    pub formatter: MatchFormatter,
}

impl BackReference {
    pub fn placeholder(&self) -> String {
        format!("\\{}", self.index)
    }
}

/// A compiled constraint for one pattern position.
#[derive(Debug, Clone, Default)]
pub struct MatchElement {
    pub(crate) text: Option<StringMatcher>,
    pub(crate) match_lemma: bool,
    pub(crate) negate_string: bool,
    pub(crate) tag: Option<TagMatcher>,
    pub(crate) negate_tag: bool,
    pub(crate) requires_inflection: bool,
    pub(crate) whitespace_before: Option<bool>,
    pub(crate) and_group: Vec<MatchElement>,
    pub(crate) or_group: Vec<MatchElement>,
    pub(crate) exceptions: Vec<MatchElement>,
    pub(crate) next_exceptions: Vec<MatchElement>,
    pub(crate) previous_exceptions: Vec<MatchElement>,
    pub(crate) skip: Skip,
    pub(crate) occurrence: Occurrence,
    pub(crate) sentence_start: bool,
    pub(crate) back_reference: Option<BackReference>,
    pub(crate) unify: Option<UnifyFeatures>,
    pub(crate) uni_negated: bool,
    pub(crate) unify_neutral: bool,
}

impl MatchElement {
    pub fn builder() -> ElementBuilder {
        ElementBuilder::default()
    }

    pub fn skip(&self) -> Skip {
        self.skip
    }

    pub fn occurrence(&self) -> Occurrence {
        self.occurrence
    }

    pub fn is_sentence_start(&self) -> bool {
        self.sentence_start
    }

    pub fn back_reference(&self) -> Option<&BackReference> {
        self.back_reference.as_ref()
    }

    pub fn unify_features(&self) -> Option<&UnifyFeatures> {
        self.unify.as_ref()
    }

    pub fn is_uni_negated(&self) -> bool {
        self.uni_negated
    }

    pub fn is_unify_neutral(&self) -> bool {
        self.unify_neutral
    }

    pub fn text_pattern(&self) -> Option<&str> {
        self.text.as_ref().map(StringMatcher::pattern)
    }

    /// True for a plain literal with nothing that could widen acceptance:
    /// no regex, no negation, no tag, no groups, no lemma test.
    pub fn is_plain_literal(&self) -> bool {
        self.text.as_ref().is_some_and(|t| !t.is_regex())
            && !self.negate_string
            && !self.match_lemma
            && !self.requires_inflection
            && self.tag.is_none()
            && self.or_group.is_empty()
            && self.back_reference.is_none()
            && self.unify.is_none()
    }

    /// Test one reading of `token` against this element, ignoring exceptions.
    ///
    /// AND-group members must accept the same reading; OR-group members are
    /// alternatives to the element's own constraint.
    pub fn is_matched(&self, token: &Token, reading: &Reading) -> bool {
        if self.sentence_start || token.is_sentence_start() {
            return self.sentence_start && token.is_sentence_start();
        }
        let base = self.own_constraint_matches(token, reading)
            || self.or_group.iter().any(|e| e.is_matched(token, reading));
        base && self.and_group.iter().all(|e| e.is_matched(token, reading))
    }

    fn own_constraint_matches(&self, token: &Token, reading: &Reading) -> bool {
        if let Some(ws) = self.whitespace_before
            && token.whitespace_before != ws
        {
            return false;
        }
        match &self.text {
            Some(text) => {
                let tested = if self.match_lemma {
                    reading.lemma().unwrap_or(&reading.surface)
                } else {
                    reading.surface.as_str()
                };
                if text.matches(tested) == self.negate_string {
                    return false;
                }
            }
            // A negated empty string can never match.
            None if self.negate_string => return false,
            None => {}
        }
        if let Some(tag) = &self.tag
            && tag.matches(reading.tag()) == self.negate_tag
        {
            return false;
        }
        !self.requires_inflection || reading.is_inflected()
    }

    /// True if `reading` triggers one of the element's current-token
    /// exceptions, including exceptions declared on AND-group members.
    pub fn is_excepted(&self, token: &Token, reading: &Reading) -> bool {
        self.exceptions.iter().any(|e| e.is_matched(token, reading))
            || self
                .and_group
                .iter()
                .any(|g| g.exceptions.iter().any(|e| e.is_matched(token, reading)))
    }

    /// True if any reading of the token following this element's match
    /// triggers a scope-next exception.
    pub fn is_vetoed_by_next(&self, next: &Token) -> bool {
        !self.next_exceptions.is_empty()
            && next
                .readings()
                .iter()
                .any(|r| self.next_exceptions.iter().any(|e| e.is_matched(next, r)))
    }

    /// True if any reading of the token preceding this element's match
    /// triggers a scope-previous exception.
    pub fn is_vetoed_by_previous(&self, previous: &Token) -> bool {
        !self.previous_exceptions.is_empty()
            && previous.readings().iter().any(|r| {
                self.previous_exceptions
                    .iter()
                    .any(|e| e.is_matched(previous, r))
            })
    }

    /// Copy of this element with the back-reference resolved.
    ///
    /// `text` replaces the string pattern, `tag` replaces the tag
    /// constraint. The copy carries no back-reference.
    pub(crate) fn resolved(&self, text: Option<StringMatcher>, tag: Option<TagMatcher>) -> Self {
        let mut element = self.clone();
        element.back_reference = None;
        if let Some(text) = text {
            element.text = Some(text);
        }
        if let Some(tag) = tag {
            element.tag = Some(tag);
        }
        element
    }
}

/// Uncompiled description of a [`MatchElement`].
///
/// Regular expressions and counts are validated by [`ElementBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct ElementBuilder {
    text: Option<(String, bool)>,
    case_sensitive: bool,
    match_lemma: bool,
    negate_string: bool,
    tag: Option<(String, bool)>,
    negate_tag: bool,
    requires_inflection: bool,
    whitespace_before: Option<bool>,
    and_group: Vec<ElementBuilder>,
    or_group: Vec<ElementBuilder>,
    exceptions: Vec<ElementBuilder>,
    next_exceptions: Vec<ElementBuilder>,
    previous_exceptions: Vec<ElementBuilder>,
    skip: i32,
    min_occurrence: Option<u8>,
    max_occurrence: Option<i32>,
    sentence_start: bool,
    back_reference: Option<BackReference>,
    unify: Option<UnifyFeatures>,
    uni_negated: bool,
    unify_neutral: bool,
}

impl ElementBuilder {
    /// Literal string constraint.
    pub fn text(mut self, text: &str) -> Self {
        self.text = Some((text.to_string(), false));
        self
    }

    /// Regular-expression string constraint (whole-string match).
    pub fn regex(mut self, pattern: &str) -> Self {
        self.text = Some((pattern.to_string(), true));
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    /// Test the string constraint against the lemma instead of the surface.
    pub fn lemma(mut self) -> Self {
        self.match_lemma = true;
        self
    }

    pub fn negate(mut self) -> Self {
        self.negate_string = true;
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = Some((tag.to_string(), false));
        self
    }

    pub fn tag_regex(mut self, pattern: &str) -> Self {
        self.tag = Some((pattern.to_string(), true));
        self
    }

    pub fn negate_tag(mut self) -> Self {
        self.negate_tag = true;
        self
    }

    /// Require a non-base form: the lemma must differ from the surface.
    pub fn inflected(mut self) -> Self {
        self.requires_inflection = true;
        self
    }

    pub fn whitespace_before(mut self, whitespace: bool) -> Self {
        self.whitespace_before = Some(whitespace);
        self
    }

    pub fn and(mut self, member: ElementBuilder) -> Self {
        self.and_group.push(member);
        self
    }

    pub fn or(mut self, member: ElementBuilder) -> Self {
        self.or_group.push(member);
        self
    }

    pub fn exception(mut self, exception: ElementBuilder) -> Self {
        self.exceptions.push(exception);
        self
    }

    pub fn exception_next(mut self, exception: ElementBuilder) -> Self {
        self.next_exceptions.push(exception);
        self
    }

    pub fn exception_previous(mut self, exception: ElementBuilder) -> Self {
        self.previous_exceptions.push(exception);
        self
    }

    /// Number of tokens that may be skipped before this element (-1 = any).
    pub fn skip(mut self, count: i32) -> Self {
        self.skip = count;
        self
    }

    pub fn min_occurrence(mut self, min: u8) -> Self {
        self.min_occurrence = Some(min);
        self
    }

    /// Maximum repetitions (-1 = unbounded).
    pub fn max_occurrence(mut self, max: i32) -> Self {
        self.max_occurrence = Some(max);
        self
    }

    pub fn sentence_start(mut self) -> Self {
        self.sentence_start = true;
        self
    }

    pub fn back_reference(mut self, index: usize, formatter: MatchFormatter) -> Self {
        self.back_reference = Some(BackReference { index, formatter });
        self
    }

    pub fn unify(mut self, features: UnifyFeatures) -> Self {
        self.unify = Some(features);
        self
    }

    /// Report the unification block when its tokens do *not* agree.
    pub fn uni_negated(mut self) -> Self {
        self.uni_negated = true;
        self
    }

    /// Token takes part in a unification block without being tested.
    pub fn unify_neutral(mut self) -> Self {
        self.unify_neutral = true;
        self
    }

    pub fn build(self) -> Result<MatchElement, CompileError> {
        let case_sensitive = self.case_sensitive;
        let placeholder = self.back_reference.as_ref().map(BackReference::placeholder);
        let text = match self.text {
            Some((pattern, is_regex)) if !pattern.is_empty() => match placeholder {
                Some(placeholder) if pattern.contains(&placeholder) => {
                    if is_regex {
                        // Validate everything around the placeholder now.
                        full_match_regex(&pattern.replace(&placeholder, "(?:x)"), case_sensitive)?;
                    }
                    Some(StringMatcher::template(&pattern, is_regex, case_sensitive))
                }
                _ => Some(StringMatcher::new(&pattern, is_regex, case_sensitive)?),
            },
            _ => None,
        };
        let tag = self
            .tag
            .map(|(pattern, is_regex)| TagMatcher::new(&pattern, is_regex))
            .transpose()?;
        let occurrence = Occurrence::new(
            self.min_occurrence.unwrap_or(1),
            self.max_occurrence.unwrap_or(1),
        )?;
        Ok(MatchElement {
            text,
            match_lemma: self.match_lemma,
            negate_string: self.negate_string,
            tag,
            negate_tag: self.negate_tag,
            requires_inflection: self.requires_inflection,
            whitespace_before: self.whitespace_before,
            and_group: build_all(self.and_group)?,
            or_group: build_all(self.or_group)?,
            exceptions: build_all(self.exceptions)?,
            next_exceptions: build_all(self.next_exceptions)?,
            previous_exceptions: build_all(self.previous_exceptions)?,
            skip: Skip::from_count(self.skip)?,
            occurrence,
            sentence_start: self.sentence_start,
            back_reference: self.back_reference,
            unify: self.unify,
            uni_negated: self.uni_negated,
            unify_neutral: self.unify_neutral,
        })
    }
}

fn build_all(builders: Vec<ElementBuilder>) -> Result<Vec<MatchElement>, CompileError> {
    builders.into_iter().map(ElementBuilder::build).collect()
}
