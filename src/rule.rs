//! Rules: a pattern plus what to report when it matches.

use itertools::Itertools;

use crate::error::CompileError;
use crate::format::{FormatterBuilder, MatchFormatter};
use crate::pattern::{ElementBuilder, MatchContext, MatchElement, Pattern, PatternMatch, find_all};
use crate::rule_set::MatchOptions;
use crate::synthesis::Synthesizer;
use crate::token::{Sentence, Token};
use crate::unifier::EquivalenceRegistry;

/// Reference from a suggestion to the token matched by a pattern element.
#[derive(Debug, Clone)]
pub struct MatchRef {
    pub element: usize,
    pub formatter: MatchFormatter,
    /// Format the token as pruned by the last unification block, if it took
    /// part in one.
    pub prefer_unified: bool,
}

#[derive(Debug, Clone)]
pub enum SuggestionPart {
    Text(String),
    Match(MatchRef),
}

/// One replacement template. Its candidates are every combination of its
/// parts' candidates.
#[derive(Debug, Clone, Default)]
pub struct Suggestion {
    parts: Vec<SuggestionPart>,
}

impl Suggestion {
    pub fn builder() -> SuggestionBuilder {
        SuggestionBuilder::default()
    }

    pub fn parts(&self) -> &[SuggestionPart] {
        &self.parts
    }
}

#[derive(Debug, Clone)]
enum PartBuilder {
    Text(String),
    Match {
        element: usize,
        formatter: FormatterBuilder,
        prefer_unified: bool,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionBuilder {
    parts: Vec<PartBuilder>,
}

impl SuggestionBuilder {
    pub fn text(mut self, text: &str) -> Self {
        self.parts.push(PartBuilder::Text(text.to_string()));
        self
    }

    /// The token matched by `element`, formatted by `formatter`.
    pub fn matched(mut self, element: usize, formatter: FormatterBuilder) -> Self {
        self.parts.push(PartBuilder::Match {
            element,
            formatter,
            prefer_unified: false,
        });
        self
    }

    /// Like [`matched`](Self::matched), using the unified readings.
    pub fn unified(mut self, element: usize, formatter: FormatterBuilder) -> Self {
        self.parts.push(PartBuilder::Match {
            element,
            formatter,
            prefer_unified: true,
        });
        self
    }

    fn build(self, elements: usize) -> Result<Suggestion, CompileError> {
        let parts = self
            .parts
            .into_iter()
            .map(|part| match part {
                PartBuilder::Text(text) => Ok(SuggestionPart::Text(text)),
                PartBuilder::Match {
                    element,
                    formatter,
                    prefer_unified,
                } => {
                    if element >= elements {
                        return Err(CompileError::SuggestionOutOfRange { index: element });
                    }
                    Ok(SuggestionPart::Match(MatchRef {
                        element,
                        formatter: formatter.build()?,
                        prefer_unified,
                    }))
                }
            })
            .collect::<Result<_, _>>()?;
        Ok(Suggestion { parts })
    }
}

/// A reported match.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub rule_id: String,
    /// Character offset of the first reported token.
    pub start_offset: usize,
    /// Character offset just past the last reported token.
    pub end_offset: usize,
    pub message: String,
    /// Replacement candidates, deduplicated, in suggestion order.
    pub replacements: Vec<String>,
    pub unified_tokens: Option<Vec<Token>>,
}

/// A compiled rule. Immutable and shareable between threads.
#[derive(Debug, Clone)]
pub struct Rule {
    id: String,
    pattern: Pattern,
    message: String,
    suggestions: Vec<Suggestion>,
    start_correction: usize,
    end_correction: usize,
}

impl Rule {
    pub fn builder(id: &str) -> RuleBuilder {
        RuleBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    /// All matches of this rule in `sentence`.
    pub fn find_matches(
        &self,
        sentence: &Sentence,
        registry: &EquivalenceRegistry,
        synth: Option<&dyn Synthesizer>,
        options: &MatchOptions,
    ) -> Vec<RuleMatch> {
        let tokens = sentence.tokens();
        let mut ctx = MatchContext::new(registry, synth, options.max_steps);
        find_all(&self.pattern, tokens, &mut ctx, options.allow_overlapping)
            .into_iter()
            .filter_map(|m| self.report(&m, tokens, synth))
            .collect()
    }

    /// Turn a pattern match into a report, or `None` if the corrected span
    /// is empty.
    fn report(&self, m: &PatternMatch, tokens: &[Token], synth: Option<&dyn Synthesizer>) -> Option<RuleMatch> {
        let last_element = self.pattern.len() - 1 - self.end_correction;
        let reported = &m.spans()[self.start_correction..=last_element];
        let from = reported.iter().flatten().next()?.first;
        let to = reported.iter().flatten().last()?.last;
        if from > to {
            return None;
        }
        Some(RuleMatch {
            rule_id: self.id.clone(),
            start_offset: tokens[from].start,
            end_offset: tokens[to].end(),
            message: expand_message(&self.message, m, tokens),
            replacements: self.replacements(m, tokens, synth),
            unified_tokens: m.unified_tokens().map(<[Token]>::to_vec),
        })
    }

    fn replacements(&self, m: &PatternMatch, tokens: &[Token], synth: Option<&dyn Synthesizer>) -> Vec<String> {
        self.suggestions
            .iter()
            .filter(|s| !s.parts.is_empty())
            .flat_map(|suggestion| {
                suggestion
                    .parts
                    .iter()
                    .map(|part| part_candidates(part, m, tokens, synth))
                    .multi_cartesian_product()
                    .map(|combination| combination.concat())
            })
            .unique()
            .collect()
    }
}

fn part_candidates(
    part: &SuggestionPart,
    m: &PatternMatch,
    tokens: &[Token],
    synth: Option<&dyn Synthesizer>,
) -> Vec<String> {
    let reference = match part {
        SuggestionPart::Text(text) => return vec![text.clone()],
        SuggestionPart::Match(reference) => reference,
    };
    let Some(span) = m.span(reference.element) else {
        return vec![String::new()];
    };
    let matched = &tokens[span.first];
    let token = m
        .unified_tokens()
        .filter(|_| reference.prefer_unified)
        .and_then(|unified| unified.iter().find(|t| t.start == matched.start && t.surface == matched.surface))
        .unwrap_or(matched);
    let skipped = m.skipped_after(reference.element, tokens);
    reference.formatter.format(token, skipped, synth)
}

/// Replace `\N` (1-based element number) with the text element N matched.
fn expand_message(template: &str, m: &PatternMatch, tokens: &[Token]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' || !chars.peek().is_some_and(char::is_ascii_digit) {
            out.push(c);
            continue;
        }
        // Too large a number refers to no element.
        let mut number = Some(0usize);
        while let Some(digit) = chars.peek().and_then(|d| d.to_digit(10)) {
            number = number
                .and_then(|n| n.checked_mul(10))
                .and_then(|n| n.checked_add(digit as usize));
            chars.next();
        }
        if let Some(span) = number
            .and_then(|n| n.checked_sub(1))
            .and_then(|element| m.span(element))
        {
            out.push_str(&span_text(&tokens[span.first..=span.last]));
        }
    }
    out
}

fn span_text(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (k, token) in tokens.iter().enumerate() {
        if k > 0 && token.whitespace_before {
            out.push(' ');
        }
        out.push_str(&token.surface);
    }
    out
}

/// Uncompiled description of a [`Rule`].
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    id: String,
    elements: Vec<ElementBuilder>,
    message: String,
    suggestions: Vec<SuggestionBuilder>,
    start_correction: usize,
    end_correction: usize,
}

impl RuleBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            elements: Vec::new(),
            message: String::new(),
            suggestions: Vec::new(),
            start_correction: 0,
            end_correction: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn element(mut self, element: ElementBuilder) -> Self {
        self.elements.push(element);
        self
    }

    /// Message template; `\N` stands for the text matched by element N
    /// (counting from 1).
    ///
    /// Element patterns number their placeholders from 0 instead, so `\0`
    /// in a message refers to nothing and expands to an empty string.
    pub fn message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }

    pub fn suggestion(mut self, suggestion: SuggestionBuilder) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    /// Leave the first `n` elements out of the reported span.
    pub fn start_correction(mut self, n: usize) -> Self {
        self.start_correction = n;
        self
    }

    /// Leave the last `n` elements out of the reported span.
    pub fn end_correction(mut self, n: usize) -> Self {
        self.end_correction = n;
        self
    }

    /// Compile and validate. Errors carry the rule id.
    pub fn build(self, registry: &EquivalenceRegistry) -> Result<Rule, CompileError> {
        let id = self.id.clone();
        self.compile(registry).map_err(|err| err.in_rule(&id))
    }

    fn compile(self, registry: &EquivalenceRegistry) -> Result<Rule, CompileError> {
        let elements = self
            .elements
            .into_iter()
            .map(ElementBuilder::build)
            .collect::<Result<Vec<MatchElement>, _>>()?;
        let len = elements.len();
        let pattern = Pattern::new(elements, registry)?;
        if self.start_correction + self.end_correction >= len {
            return Err(CompileError::PositionCorrection {
                start: self.start_correction,
                end: self.end_correction,
                len,
            });
        }
        let suggestions = self
            .suggestions
            .into_iter()
            .map(|s| s.build(len))
            .collect::<Result<_, _>>()?;
        Ok(Rule {
            id: self.id,
            pattern,
            message: self.message,
            suggestions,
            start_correction: self.start_correction,
            end_correction: self.end_correction,
        })
    }
}
