//! Testing one element against the token at one position.
//!
//! Acceptance runs in two passes. The first is pure and asks whether any
//! exception disqualifies the token. Only a token that survives it is
//! offered reading by reading to the element (and to the unifier when the
//! element takes part in agreement).

use itertools::Itertools;
use tracing::debug;

use crate::format::MatchFormatter;
use crate::synthesis::Synthesizer;
use crate::token::Token;
use crate::unifier::Unifier;

use super::element::{BackReference, MatchElement};
use super::text_matcher::{StringMatcher, TagMatcher, escape};

/// True if an exception bars `tokens[t]` from `element`.
///
/// Covers current-token exceptions (any reading is enough) and the
/// element's scope-previous exceptions, tested against `tokens[t - 1]`.
pub(crate) fn is_disqualified(element: &MatchElement, tokens: &[Token], t: usize) -> bool {
    let token = &tokens[t];
    if token.readings().iter().any(|r| element.is_excepted(token, r)) {
        return true;
    }
    t > 0 && element.is_vetoed_by_previous(&tokens[t - 1])
}

/// Whether `element` accepts `tokens[t]`.
///
/// Feeds the token to `unifier` when the element unifies (every reading,
/// matched or not, so the run can close the token) or is unification
/// neutral. The caller restores the unifier if the branch fails.
pub(crate) fn accepts(element: &MatchElement, tokens: &[Token], t: usize, unifier: &mut Unifier<'_>) -> bool {
    if is_disqualified(element, tokens, t) {
        return false;
    }
    let token = &tokens[t];
    let Some(features) = element.unify_features() else {
        let matched = token.readings().iter().any(|r| element.is_matched(token, r));
        if matched && element.is_unify_neutral() && unifier.is_unifying() {
            unifier.add_neutral_element(token);
        }
        return matched;
    };

    let count = token.readings().len();
    let mut matched = false;
    let mut unified = false;
    for (k, reading) in token.readings().iter().enumerate() {
        let reading_matched = element.is_matched(token, reading);
        matched |= reading_matched;
        unified |= unifier.is_unified(token, reading, features, k + 1 == count, reading_matched);
    }
    // A negated block is decided as a whole once it closes.
    if element.is_uni_negated() {
        matched
    } else {
        matched && unified
    }
}

/// Compile `element` against the token its back-reference points at.
///
/// Returns `None` if the substituted pattern does not compile, in which
/// case the element cannot match in this attempt.
pub(crate) fn resolve_back_reference(
    element: &MatchElement,
    reference: &BackReference,
    referenced: &Token,
    synth: Option<&dyn Synthesizer>,
) -> Option<MatchElement> {
    let formatter = &reference.formatter;
    if formatter.sets_tag() {
        let tag = resolved_tag(formatter, referenced, synth)?;
        return Some(element.resolved(None, Some(tag)));
    }
    let template = element.text.as_ref()?;
    let candidates = formatter.format(referenced, &[], synth);
    let text = substitute(template, &reference.placeholder(), &candidates)?;
    Some(element.resolved(Some(text), None))
}

fn resolved_tag(
    formatter: &MatchFormatter,
    referenced: &Token,
    synth: Option<&dyn Synthesizer>,
) -> Option<TagMatcher> {
    let tag = formatter.target_tag(referenced, synth)?;
    TagMatcher::new(&tag, formatter.is_tag_regex())
        .inspect_err(|err| debug!(%err, "back-reference tag does not compile"))
        .ok()
}

/// Replace `placeholder` in `template` with the candidate forms.
///
/// A single candidate in a literal stays literal; otherwise the pattern
/// becomes a regex with the candidates as escaped alternatives.
fn substitute(template: &StringMatcher, placeholder: &str, candidates: &[String]) -> Option<StringMatcher> {
    let pattern = template.pattern();
    let case_sensitive = template.is_case_sensitive();
    if let [single] = candidates
        && !template.is_regex()
    {
        return Some(StringMatcher::literal(
            &pattern.replace(placeholder, single),
            case_sensitive,
        ));
    }
    let alternatives = match candidates {
        [single] => escape(single),
        _ => format!("(?:{})", candidates.iter().map(|c| escape(c)).join("|")),
    };
    let regex = if template.is_regex() {
        pattern.replace(placeholder, &alternatives)
    } else {
        pattern.split(placeholder).map(escape).join(&alternatives)
    };
    StringMatcher::regex(&regex, case_sensitive)
        .inspect_err(|err| debug!(%err, "back-reference pattern does not compile"))
        .ok()
}
