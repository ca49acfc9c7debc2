//! Pattern matcher: find matches of a [`Pattern`] in a tagged sentence.
//!
//! All positions are **token** indices into the sentence; index 0 is the
//! synthetic sentence-start token.
//!
//! The search is a recursive backtracking walk over the elements. For each
//! element it tries the candidate first tokens nearest-first (skip), then
//! the number of repetitions most-first (occurrence), and finally omission
//! for optional elements. Everything that changes while walking lives in a
//! [`MatchContext`], so a compiled pattern is never written to.

use std::borrow::Cow;

use tracing::trace;

use crate::error::CompileError;
use crate::synthesis::Synthesizer;
use crate::token::Token;
use crate::unifier::{EquivalenceRegistry, Unifier};

use super::element::MatchElement;
use super::evaluate::{accepts, resolve_back_reference};

/// Default number of backtracking steps before giving up on a start token.
pub const MAX_STEPS: usize = 100_000;

/// A validated, immutable sequence of elements.
#[derive(Debug, Clone)]
pub struct Pattern {
    elements: Vec<MatchElement>,
    /// Per element: true if it is the last unifying element of its block.
    closes_unification: Vec<bool>,
}

impl Pattern {
    /// Validate `elements` against each other and against `registry`.
    pub fn new(elements: Vec<MatchElement>, registry: &EquivalenceRegistry) -> Result<Self, CompileError> {
        if elements.is_empty() {
            return Err(CompileError::EmptyPattern);
        }
        for (i, element) in elements.iter().enumerate() {
            if let Some(reference) = element.back_reference() {
                let index = reference.index;
                if index >= i {
                    return Err(CompileError::BackReferenceOutOfRange { element: i, index });
                }
                if elements[index].occurrence().is_optional() {
                    return Err(CompileError::BackReferenceToOptional { element: i, index });
                }
                if reference.formatter.sets_tag() && !reference.formatter.has_target_tag() {
                    return Err(CompileError::MissingTargetTag { element: i });
                }
                if !reference.formatter.sets_tag()
                    && !element
                        .text_pattern()
                        .is_some_and(|p| p.contains(&reference.placeholder()))
                {
                    return Err(CompileError::MissingPlaceholder { element: i, index });
                }
            }
            if let Some(features) = element.unify_features() {
                registry.validate(features)?;
            }
        }
        let closes_unification = (0..elements.len())
            .map(|i| {
                elements[i].unify_features().is_some()
                    && !elements[i + 1..]
                        .iter()
                        .find(|e| !(e.is_unify_neutral() && e.unify_features().is_none()))
                        .is_some_and(|e| e.unify_features().is_some())
            })
            .collect();
        Ok(Self {
            elements,
            closes_unification,
        })
    }

    pub fn elements(&self) -> &[MatchElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// True if the pattern is anchored at the sentence-start token.
    pub fn is_anchored(&self) -> bool {
        self.elements[0].is_sentence_start()
    }
}

/// Tokens consumed by one element: `first..=last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpan {
    pub first: usize,
    pub last: usize,
}

/// A successful match of a whole pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    /// One entry per element; `None` for an omitted optional element.
    spans: Vec<Option<ElementSpan>>,
    first: usize,
    last: usize,
    unified_tokens: Option<Vec<Token>>,
}

impl PatternMatch {
    /// Returns `None` if no element consumed a token.
    fn new(spans: Vec<Option<ElementSpan>>, unified_tokens: Option<Vec<Token>>) -> Option<Self> {
        let first = spans.iter().flatten().next()?.first;
        let last = spans.iter().flatten().last()?.last;
        Some(Self {
            spans,
            first,
            last,
            unified_tokens,
        })
    }

    pub fn spans(&self) -> &[Option<ElementSpan>] {
        &self.spans
    }

    pub fn span(&self, element: usize) -> Option<ElementSpan> {
        self.spans.get(element).copied().flatten()
    }

    /// Index of the first matched token.
    pub fn first_token(&self) -> usize {
        self.first
    }

    /// Index of the last matched token.
    pub fn last_token(&self) -> usize {
        self.last
    }

    /// Tokens of the last closed unification block, pruned to the readings
    /// that agree.
    pub fn unified_tokens(&self) -> Option<&[Token]> {
        self.unified_tokens.as_deref()
    }

    /// Tokens skipped between `element`'s match and the next matched element.
    pub fn skipped_after<'t>(&self, element: usize, tokens: &'t [Token]) -> &'t [Token] {
        let Some(span) = self.span(element) else {
            return &[];
        };
        match self.spans[element + 1..].iter().flatten().next() {
            Some(next) => &tokens[span.last + 1..next.first],
            None => &[],
        }
    }
}

/// Mutable state of one match attempt.
///
/// Built fresh for every call that matches a pattern against a sentence and
/// never shared, so compiled patterns and the registry stay read-only.
pub struct MatchContext<'a> {
    unifier: Unifier<'a>,
    synth: Option<&'a dyn Synthesizer>,
    max_steps: usize,
    steps: usize,
    unified_tokens: Option<Vec<Token>>,
}

impl<'a> MatchContext<'a> {
    pub fn new(registry: &'a EquivalenceRegistry, synth: Option<&'a dyn Synthesizer>, max_steps: usize) -> Self {
        Self {
            unifier: registry.start_run(),
            synth,
            max_steps,
            steps: 0,
            unified_tokens: None,
        }
    }

    pub fn synthesizer(&self) -> Option<&'a dyn Synthesizer> {
        self.synth
    }

    fn reset(&mut self) {
        self.unifier.reset();
        self.steps = 0;
        self.unified_tokens = None;
    }

    fn exhausted(&self) -> bool {
        self.steps > self.max_steps
    }
}

// ─── Public API ─────────────────────────────────────────────────────────────

/// Find all matches, scanning start tokens left to right.
///
/// After a match the scan resumes behind it, or at the next token when
/// `allow_overlapping` is set.
pub fn find_all(
    pattern: &Pattern,
    tokens: &[Token],
    ctx: &mut MatchContext<'_>,
    allow_overlapping: bool,
) -> Vec<PatternMatch> {
    let mut matches = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        if start > 0 && pattern.is_anchored() {
            break;
        }
        match match_at(pattern, tokens, start, ctx) {
            Some(m) => {
                start = if allow_overlapping {
                    start + 1
                } else {
                    m.last_token() + 1
                };
                matches.push(m);
            }
            None => start += 1,
        }
    }
    matches
}

/// Test whether a match begins exactly at token `start`.
pub fn match_at(
    pattern: &Pattern,
    tokens: &[Token],
    start: usize,
    ctx: &mut MatchContext<'_>,
) -> Option<PatternMatch> {
    ctx.reset();
    let mut spans = vec![None; pattern.len()];
    if match_elements(pattern, tokens, 0, start, None, ctx, &mut spans) {
        PatternMatch::new(spans, ctx.unified_tokens.take())
    } else {
        if ctx.exhausted() {
            trace!(start, max_steps = ctx.max_steps, "step budget exhausted");
        }
        None
    }
}

// ─── Core matching functions ─────────────────────────────────────────────────

/// Match elements `idx..` with the next free token at `pos`.
///
/// `prev` is the index and last token of the most recent element that
/// consumed tokens; its scope-next exceptions veto the tokens after it.
fn match_elements(
    pattern: &Pattern,
    tokens: &[Token],
    idx: usize,
    pos: usize,
    prev: Option<(usize, usize)>,
    ctx: &mut MatchContext<'_>,
    spans: &mut [Option<ElementSpan>],
) -> bool {
    ctx.steps += 1;
    if ctx.exhausted() {
        return false;
    }
    let elements = pattern.elements();
    let Some(element) = elements.get(idx) else {
        // The last element's lookahead veto still applies.
        return !prev.is_some_and(|(p, last)| {
            tokens
                .get(last + 1)
                .is_some_and(|next| elements[p].is_vetoed_by_next(next))
        });
    };

    if let Some(resolved) = resolve(element, tokens, spans, ctx.synth) {
        // The first element to consume tokens has no predecessor to skip from.
        let width = match prev {
            Some(_) => element.skip().width(tokens.len().saturating_sub(pos + 1)),
            None => 0,
        };
        for first in pos..=pos + width {
            if first >= tokens.len() {
                break;
            }
            if let Some((p, _)) = prev
                && elements[p].is_vetoed_by_next(&tokens[first])
            {
                break;
            }
            if match_occurrences(pattern, tokens, idx, &resolved, first, ctx, spans) {
                return true;
            }
            if ctx.exhausted() {
                return false;
            }
        }
    }

    if element.occurrence().is_optional() {
        spans[idx] = None;
        return match_elements(pattern, tokens, idx + 1, pos, prev, ctx, spans);
    }
    false
}

/// The element to test, with its back-reference (if any) compiled against
/// the token the referenced element matched in this attempt.
fn resolve<'e>(
    element: &'e MatchElement,
    tokens: &[Token],
    spans: &[Option<ElementSpan>],
    synth: Option<&dyn Synthesizer>,
) -> Option<Cow<'e, MatchElement>> {
    let Some(reference) = element.back_reference() else {
        return Some(Cow::Borrowed(element));
    };
    let span = spans.get(reference.index).copied().flatten()?;
    resolve_back_reference(element, reference, &tokens[span.first], synth).map(Cow::Owned)
}

/// Match `element` (already resolved) one or more times from `first`,
/// trying the longest run first.
fn match_occurrences(
    pattern: &Pattern,
    tokens: &[Token],
    idx: usize,
    element: &MatchElement,
    first: usize,
    ctx: &mut MatchContext<'_>,
    spans: &mut [Option<ElementSpan>],
) -> bool {
    let max = element.occurrence().max.unwrap_or(usize::MAX);
    let saved_unifier = ctx.unifier.clone();
    let saved_unified = ctx.unified_tokens.clone();

    // Each run length with the unifier state it leaves behind.
    let mut ends = Vec::new();
    let mut t = first;
    while ends.len() < max && t < tokens.len() && accepts(element, tokens, t, &mut ctx.unifier) {
        ends.push((t, ctx.unifier.clone()));
        t += 1;
    }

    for (last, state) in ends.into_iter().rev() {
        ctx.unifier = state;
        ctx.unified_tokens = saved_unified.clone();
        if pattern.closes_unification[idx] && !close_unification(element, ctx) {
            continue;
        }
        spans[idx] = Some(ElementSpan { first, last });
        if match_elements(pattern, tokens, idx + 1, last + 1, Some((idx, last)), ctx, spans) {
            return true;
        }
        if ctx.exhausted() {
            break;
        }
    }

    ctx.unifier = saved_unifier;
    ctx.unified_tokens = saved_unified;
    spans[idx] = None;
    false
}

/// Decide the unification block that `element` ends and start a new run.
fn close_unification(element: &MatchElement, ctx: &mut MatchContext<'_>) -> bool {
    let agreed = ctx.unifier.final_unification_value() != element.is_uni_negated();
    if agreed {
        ctx.unified_tokens = ctx.unifier.final_unified_tokens();
    }
    ctx.unifier.reset();
    agreed
}
