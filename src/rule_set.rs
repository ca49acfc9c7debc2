//! A loaded collection of rules sharing one equivalence registry.

use std::sync::Arc;

use anyhow::Context;
use tracing::error;

use crate::error::CompileError;
use crate::pattern::MAX_STEPS;
use crate::rule::{Rule, RuleBuilder, RuleMatch};
use crate::synthesis::Synthesizer;
use crate::token::Sentence;
use crate::unifier::EquivalenceRegistry;

/// Tunables for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Backtracking steps allowed per start token before it counts as no
    /// match.
    pub max_steps: usize,
    /// Resume scanning at the token after a match start instead of after
    /// the match.
    pub allow_overlapping: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_steps: MAX_STEPS,
            allow_overlapping: false,
        }
    }
}

/// Compiled rules ready to check sentences.
///
/// Everything in a rule set is read-only after loading; one set can check
/// sentences on any number of threads at once.
#[derive(Debug, Clone)]
pub struct RuleSet {
    registry: Arc<EquivalenceRegistry>,
    rules: Vec<Rule>,
    options: MatchOptions,
}

impl RuleSet {
    pub fn new(registry: Arc<EquivalenceRegistry>) -> Self {
        Self {
            registry,
            rules: Vec::new(),
            options: MatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Compile every rule. Faulty rules are logged, left out, and returned
    /// as diagnostics; the rest are loaded.
    pub fn load(
        registry: Arc<EquivalenceRegistry>,
        builders: impl IntoIterator<Item = RuleBuilder>,
    ) -> (Self, Vec<CompileError>) {
        let mut set = Self::new(registry);
        let mut rejected = Vec::new();
        for builder in builders {
            match builder.build(&set.registry) {
                Ok(rule) => set.rules.push(rule),
                Err(err) => {
                    error!(%err, "rule rejected");
                    rejected.push(err);
                }
            }
        }
        (set, rejected)
    }

    /// Compile and add one rule.
    pub fn try_add(&mut self, builder: RuleBuilder) -> anyhow::Result<()> {
        let id = builder.id().to_string();
        let rule = builder
            .build(&self.registry)
            .with_context(|| format!("Failed to load rule {id}"))?;
        self.rules.push(rule);
        Ok(())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn registry(&self) -> &EquivalenceRegistry {
        &self.registry
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Run every rule over `sentence`; matches come in rule order.
    pub fn check(&self, sentence: &Sentence, synth: Option<&dyn Synthesizer>) -> Vec<RuleMatch> {
        self.rules
            .iter()
            .flat_map(|rule| rule.find_matches(sentence, &self.registry, synth, &self.options))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::MatchElement;
    use crate::token::Token;

    fn sentence(words: &[&str]) -> Sentence {
        let mut offset = 0;
        let tokens = words
            .iter()
            .map(|w| {
                let token = Token::with_reading(w, w, "X", offset).with_whitespace_before(offset > 0);
                offset += w.chars().count() + 1;
                token
            })
            .collect();
        Sentence::new(tokens)
    }

    fn literal_rule(id: &str, text: &str) -> RuleBuilder {
        Rule::builder(id).element(MatchElement::builder().text(text))
    }

    #[test]
    fn load_rejects_faulty_rules_and_keeps_the_rest() {
        let builders = vec![
            literal_rule("A", "a"),
            Rule::builder("BAD").element(MatchElement::builder().regex("[")),
            literal_rule("B", "b"),
        ];
        let (set, rejected) = RuleSet::load(Arc::new(EquivalenceRegistry::new()), builders);
        assert_eq!(set.len(), 2);
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].to_string().starts_with("Rule BAD:"));
    }

    #[test]
    fn check_reports_in_rule_order() {
        let (set, _) = RuleSet::load(
            Arc::new(EquivalenceRegistry::new()),
            vec![literal_rule("B", "b"), literal_rule("A", "a")],
        );
        let found = set.check(&sentence(&["a", "b", "a"]), None);
        let ids: Vec<&str> = found.iter().map(|m| m.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "A"]);
    }

    #[test]
    fn try_add_reports_context() {
        let mut set = RuleSet::new(Arc::new(EquivalenceRegistry::new()));
        set.try_add(literal_rule("A", "a")).unwrap();
        let err = set
            .try_add(Rule::builder("EMPTY"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to load rule EMPTY");
        assert!(err.root_cause().to_string().contains("no elements"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn overlapping_option() {
        let rule = || {
            Rule::builder("AA")
                .element(MatchElement::builder().text("a"))
                .element(MatchElement::builder().text("a"))
        };
        let text = sentence(&["a", "a", "a"]);
        let (set, _) = RuleSet::load(Arc::new(EquivalenceRegistry::new()), vec![rule()]);
        assert_eq!(set.check(&text, None).len(), 1);
        let overlapping = set.with_options(MatchOptions {
            allow_overlapping: true,
            ..MatchOptions::default()
        });
        assert_eq!(overlapping.check(&text, None).len(), 2);
    }
}
