//! Feature unification: agreement of grammatical features across tokens.
//!
//! The [`EquivalenceRegistry`] defines, for each feature (e.g. `number`) and
//! each of its types (e.g. `plural`), the element a reading must satisfy to
//! count as that type. It is built once and shared.
//!
//! A [`Unifier`] is the state of one unification run. It is created from the
//! registry for every match attempt and never shared between attempts.
//!
//! A run has two phases. While *collecting*, every accepted reading of the
//! first token opens an agreement frame holding the types it satisfies. Once
//! the first token is done the run starts *unifying*: a reading of a later
//! token is accepted only if it intersects some live frame on every
//! requested feature, and when a token is finished each frame shrinks to the
//! types that token kept. Agreement therefore has to hold with the
//! intersection of everything seen so far, not just with the previous token.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use tracing::warn;

use crate::error::CompileError;
use crate::pattern::MatchElement;
use crate::reading::Reading;
use crate::token::Token;

/// Features (and optionally a subset of their types) a unification block
/// must agree on.
///
/// An empty type list stands for every type the registry defines for the
/// feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifyFeatures {
    features: Vec<(String, Vec<String>)>,
}

impl UnifyFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agree on `feature` using all of its registered types.
    pub fn feature(mut self, feature: &str) -> Self {
        self.features.push((feature.to_string(), Vec::new()));
        self
    }

    /// Agree on `feature`, considering only `types`.
    pub fn feature_types(mut self, feature: &str, types: &[&str]) -> Self {
        let types = types.iter().map(|t| t.to_string()).collect();
        self.features.push((feature.to_string(), types));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.features
            .iter()
            .map(|(feature, types)| (feature.as_str(), types.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Types satisfied per feature.
type FeatureTypes = BTreeMap<String, BTreeSet<String>>;

/// Shared, read-only table of equivalence types.
#[derive(Debug, Default)]
pub struct EquivalenceRegistry {
    /// Feature name to its types, in definition order.
    features: BTreeMap<String, Vec<(String, MatchElement)>>,
    /// Missing (feature, type) pairs already logged.
    reported_misses: Mutex<HashSet<(String, String)>>,
}

impl EquivalenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `type_name` of `feature` as the readings accepted by `test`.
    ///
    /// Redefining a type replaces the previous test.
    pub fn define(&mut self, feature: &str, type_name: &str, test: MatchElement) -> &mut Self {
        let types = self.features.entry(feature.to_string()).or_default();
        match types.iter_mut().find(|(name, _)| name == type_name) {
            Some(slot) => slot.1 = test,
            None => types.push((type_name.to_string(), test)),
        }
        self
    }

    /// Names of the types defined for `feature`, in definition order.
    pub fn types_of(&self, feature: &str) -> Option<Vec<&str>> {
        self.features
            .get(feature)
            .map(|types| types.iter().map(|(name, _)| name.as_str()).collect())
    }

    /// Check that every feature and type named in `features` is defined.
    pub fn validate(&self, features: &UnifyFeatures) -> Result<(), CompileError> {
        for (feature, requested) in features.iter() {
            let Some(types) = self.features.get(feature) else {
                return Err(CompileError::UnknownFeature(feature.to_string()));
            };
            if let Some(missing) = requested
                .iter()
                .find(|name| !types.iter().any(|(defined, _)| defined == *name))
            {
                return Err(CompileError::UnknownEquivalence {
                    feature: feature.to_string(),
                    type_name: missing.clone(),
                });
            }
        }
        Ok(())
    }

    /// Fresh run state for one match attempt.
    pub fn start_run(&self) -> Unifier<'_> {
        Unifier::new(self)
    }

    /// Types `reading` satisfies for each requested feature, or `None` if
    /// some feature has no satisfied type.
    ///
    /// A feature or type missing from the registry fails closed.
    fn satisfied_types(
        &self,
        token: &Token,
        reading: &Reading,
        features: &UnifyFeatures,
    ) -> Option<FeatureTypes> {
        let mut satisfied = FeatureTypes::new();
        for (feature, requested) in features.iter() {
            let Some(types) = self.features.get(feature) else {
                self.report_miss(feature, "*");
                return None;
            };
            let mut found = BTreeSet::new();
            if requested.is_empty() {
                for (name, test) in types {
                    if test.is_matched(token, reading) {
                        found.insert(name.clone());
                    }
                }
            } else {
                for name in requested {
                    let Some((_, test)) = types.iter().find(|(defined, _)| defined == name) else {
                        self.report_miss(feature, name);
                        return None;
                    };
                    if test.is_matched(token, reading) {
                        found.insert(name.clone());
                    }
                }
            }
            if found.is_empty() {
                return None;
            }
            satisfied.insert(feature.to_string(), found);
        }
        Some(satisfied)
    }

    fn report_miss(&self, feature: &str, type_name: &str) {
        if let Ok(mut seen) = self.reported_misses.lock()
            && seen.insert((feature.to_string(), type_name.to_string()))
        {
            warn!(feature, type_name, "no equivalence defined; unification fails");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Collecting,
    Unifying,
}

/// One token of the run, with the readings that took part and the types
/// each of them satisfied.
#[derive(Debug, Clone)]
struct RunToken {
    token: Token,
    readings: Vec<(Reading, FeatureTypes)>,
    neutral: bool,
}

/// Per-attempt unification state.
///
/// Cloning is cheap enough to snapshot the state before a backtracking
/// branch and restore it afterwards.
#[derive(Debug, Clone)]
pub struct Unifier<'r> {
    registry: &'r EquivalenceRegistry,
    phase: Phase,
    /// One agreement frame per accepted reading of the first token;
    /// `None` once the frame no longer agrees with later tokens.
    frames: Vec<Option<FeatureTypes>>,
    sequence: Vec<RunToken>,
    /// The token currently being unified and its accepted readings.
    current: Option<RunToken>,
    token_unified: bool,
}

impl<'r> Unifier<'r> {
    pub fn new(registry: &'r EquivalenceRegistry) -> Self {
        Self {
            registry,
            phase: Phase::Collecting,
            frames: Vec::new(),
            sequence: Vec::new(),
            current: None,
            token_unified: false,
        }
    }

    /// True once the first token of the run has been fully processed.
    pub fn is_unifying(&self) -> bool {
        self.phase == Phase::Unifying
    }

    /// Test one reading against the run and record it if it agrees.
    pub fn is_satisfied(&mut self, token: &Token, reading: &Reading, features: &UnifyFeatures) -> bool {
        let Some(types) = self.registry.satisfied_types(token, reading, features) else {
            return false;
        };
        match self.phase {
            Phase::Collecting => {
                self.frames.push(Some(types.clone()));
                if self.sequence.is_empty() {
                    self.sequence.push(RunToken {
                        token: token.clone(),
                        readings: Vec::new(),
                        neutral: false,
                    });
                }
                if let Some(first) = self.sequence.first_mut() {
                    first.readings.push((reading.clone(), types));
                }
                true
            }
            Phase::Unifying => {
                let agrees = self.live_frames().any(|frame| intersects(frame, &types));
                if agrees {
                    self.current
                        .get_or_insert_with(|| RunToken {
                            token: token.clone(),
                            readings: Vec::new(),
                            neutral: false,
                        })
                        .readings
                        .push((reading.clone(), types));
                }
                agrees
            }
        }
    }

    /// End the collection phase: later readings must agree with the frames
    /// opened by the first token.
    pub fn start_unify(&mut self) {
        self.phase = Phase::Unifying;
        self.token_unified = false;
    }

    /// Close the current token and narrow every frame to the types the
    /// token's accepted readings share with it.
    ///
    /// A token with no accepted reading kills every frame.
    pub fn start_next_token(&mut self) {
        let current = self.current.take();
        let readings = current.as_ref().map(|t| t.readings.as_slice()).unwrap_or(&[]);
        for slot in &mut self.frames {
            let Some(frame) = slot.as_ref() else {
                continue;
            };
            let mut narrowed: Option<FeatureTypes> = None;
            for (_, types) in readings.iter().filter(|(_, types)| intersects(frame, types)) {
                let shared = intersection(frame, types);
                match narrowed.as_mut() {
                    Some(acc) => {
                        for (feature, names) in shared {
                            acc.entry(feature).or_default().extend(names);
                        }
                    }
                    None => narrowed = Some(shared),
                }
            }
            *slot = narrowed;
        }
        if let Some(token) = current {
            self.sequence.push(token);
        } else {
            self.frames.iter_mut().for_each(|slot| *slot = None);
        }
        self.token_unified = false;
    }

    /// Feed one reading of a token through the run.
    ///
    /// `last_reading` marks the token's final reading: it closes the token
    /// (and ends the collection phase after the first token). `is_matched`
    /// tells whether the reading satisfied the pattern element; unmatched
    /// readings take no part in the run.
    ///
    /// While collecting, the result is whether this reading was recorded.
    /// While unifying, it is whether some reading of the current token
    /// agreed so far and the run as a whole still holds.
    pub fn is_unified(
        &mut self,
        token: &Token,
        reading: &Reading,
        features: &UnifyFeatures,
        last_reading: bool,
        is_matched: bool,
    ) -> bool {
        match self.phase {
            Phase::Collecting => {
                let recorded = is_matched && self.is_satisfied(token, reading, features);
                if last_reading {
                    self.start_unify();
                }
                recorded
            }
            Phase::Unifying => {
                if is_matched && self.is_satisfied(token, reading, features) {
                    self.token_unified = true;
                }
                let unified = self.token_unified;
                if last_reading {
                    self.start_next_token();
                }
                unified && self.final_unification_value()
            }
        }
    }

    /// Append a token that agrees with everything (punctuation, connectives).
    pub fn add_neutral_element(&mut self, token: &Token) {
        self.sequence.push(RunToken {
            token: token.clone(),
            readings: token
                .readings()
                .iter()
                .map(|r| (r.clone(), FeatureTypes::new()))
                .collect(),
            neutral: true,
        });
    }

    /// Whether every token of the run agrees on all requested features.
    pub fn final_unification_value(&self) -> bool {
        self.phase == Phase::Unifying
            && self.live_frames().next().is_some()
            && self
                .sequence
                .iter()
                .all(|t| t.neutral || !t.readings.is_empty())
    }

    /// The run's tokens, each pruned to the readings that agree with a
    /// surviving frame, or `None` if the run did not unify.
    pub fn final_unified_tokens(&self) -> Option<Vec<Token>> {
        if !self.final_unification_value() {
            return None;
        }
        let tokens = self
            .sequence
            .iter()
            .map(|run_token| {
                let kept: Vec<&Reading> = run_token
                    .readings
                    .iter()
                    .filter(|(_, types)| {
                        run_token.neutral || self.live_frames().any(|frame| intersects(frame, types))
                    })
                    .map(|(reading, _)| reading)
                    .collect();
                let mut token = run_token.token.clone();
                token.retain_readings(|r| kept.contains(&r));
                token
            })
            .collect();
        Some(tokens)
    }

    /// Clear all run state so the unifier can serve an unrelated run.
    pub fn reset(&mut self) {
        self.phase = Phase::Collecting;
        self.frames.clear();
        self.sequence.clear();
        self.current = None;
        self.token_unified = false;
    }

    fn live_frames(&self) -> impl Iterator<Item = &FeatureTypes> {
        self.frames.iter().flatten()
    }
}

/// True if `types` shares at least one type with `frame` on every feature
/// of the frame.
fn intersects(frame: &FeatureTypes, types: &FeatureTypes) -> bool {
    frame.iter().all(|(feature, names)| {
        types
            .get(feature)
            .is_some_and(|other| !names.is_disjoint(other))
    })
}

fn intersection(frame: &FeatureTypes, types: &FeatureTypes) -> FeatureTypes {
    frame
        .iter()
        .map(|(feature, names)| {
            let shared = match types.get(feature) {
                Some(other) => names.intersection(other).cloned().collect(),
                None => BTreeSet::new(),
            };
            (feature.clone(), shared)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EquivalenceRegistry {
        let mut registry = EquivalenceRegistry::new();
        let tag = |pattern: &str| MatchElement::builder().tag_regex(pattern).build().unwrap();
        registry
            .define("number", "singular", tag(".*:sg.*"))
            .define("number", "plural", tag(".*:pl.*"))
            .define("gender", "masc", tag(".*:masc.*"))
            .define("gender", "fem", tag(".*:fem.*"));
        registry
    }

    fn token(surface: &str, tags: &[&str]) -> Token {
        let readings = tags.iter().map(|t| Reading::new(surface, surface, t)).collect();
        Token::new(surface, readings, 0)
    }

    /// Feed every reading of every token; returns the per-token results.
    fn run(unifier: &mut Unifier<'_>, tokens: &[Token], features: &UnifyFeatures) -> Vec<bool> {
        tokens
            .iter()
            .map(|t| {
                let n = t.readings().len();
                let mut any = false;
                for (i, r) in t.readings().iter().enumerate() {
                    any |= unifier.is_unified(t, r, features, i + 1 == n, true);
                }
                any
            })
            .collect()
    }

    fn number() -> UnifyFeatures {
        UnifyFeatures::new().feature("number")
    }

    #[test]
    fn agreeing_pair_unifies() {
        let registry = registry();
        let mut u = registry.start_run();
        let results = run(
            &mut u,
            &[token("der", &["DET:sg"]), token("Mann", &["NOUN:sg"])],
            &number(),
        );
        assert_eq!(results, vec![true, true]);
        assert!(u.final_unification_value());
    }

    #[test]
    fn disagreeing_pair_fails() {
        let registry = registry();
        let mut u = registry.start_run();
        let results = run(
            &mut u,
            &[token("der", &["DET:sg"]), token("Männer", &["NOUN:pl"])],
            &number(),
        );
        assert_eq!(results, vec![true, false]);
        assert!(!u.final_unification_value());
        assert!(u.final_unified_tokens().is_none());
    }

    #[test]
    fn agreement_is_checked_against_the_intersection() {
        // A and B share singular, B and C share plural, A and C share nothing.
        let registry = registry();
        let mut u = registry.start_run();
        let results = run(
            &mut u,
            &[
                token("a", &["DET:sg"]),
                token("b", &["ADJ:sg:pl"]),
                token("c", &["NOUN:pl"]),
            ],
            &number(),
        );
        assert_eq!(results, vec![true, true, false]);
        assert!(!u.final_unification_value());
    }

    #[test]
    fn intersection_with_alternative_readings() {
        let registry = registry();
        let mut u = registry.start_run();
        let results = run(
            &mut u,
            &[
                token("a", &["DET:sg"]),
                token("b", &["ADJ:sg", "ADJ:pl"]),
                token("c", &["NOUN:pl"]),
            ],
            &number(),
        );
        assert_eq!(results, vec![true, true, false]);
    }

    #[test]
    fn unified_tokens_are_pruned() {
        let registry = registry();
        let mut u = registry.start_run();
        run(
            &mut u,
            &[
                token("die", &["DET:sg:fem", "DET:pl:fem"]),
                token("Frauen", &["NOUN:pl:fem"]),
            ],
            &number(),
        );
        let tokens = u.final_unified_tokens().unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].readings().len(), 1);
        assert_eq!(tokens[0].readings()[0].tag(), Some("DET:pl:fem"));
    }

    #[test]
    fn all_features_must_agree_on_one_frame() {
        let registry = registry();
        let features = UnifyFeatures::new().feature("number").feature("gender");
        let mut u = registry.start_run();
        // First token: (sg, masc) or (pl, fem). Second: (sg, fem) agrees with
        // neither frame on both features.
        let results = run(
            &mut u,
            &[
                token("x", &["DET:sg:masc", "DET:pl:fem"]),
                token("y", &["NOUN:sg:fem"]),
            ],
            &features,
        );
        assert_eq!(results, vec![true, false]);
    }

    #[test]
    fn restricted_types() {
        let registry = registry();
        let only_plural = UnifyFeatures::new().feature_types("number", &["plural"]);
        let mut u = registry.start_run();
        let results = run(
            &mut u,
            &[token("der", &["DET:sg"]), token("Mann", &["NOUN:sg"])],
            &only_plural,
        );
        assert_eq!(results, vec![false, false]);
    }

    #[test]
    fn unmatched_readings_take_no_part() {
        let registry = registry();
        let mut u = registry.start_run();
        let det = token("der", &["DET:sg"]);
        assert!(u.is_unified(&det, &det.readings()[0], &number(), true, true));
        let noun = token("Mann", &["NOUN:sg"]);
        assert!(!u.is_unified(&noun, &noun.readings()[0], &number(), true, false));
    }

    #[test]
    fn neutral_elements_agree() {
        let registry = registry();
        let mut u = registry.start_run();
        let det = token("der", &["DET:sg"]);
        u.is_unified(&det, &det.readings()[0], &number(), true, true);
        u.add_neutral_element(&token(",", &["PUNCT"]));
        let noun = token("Mann", &["NOUN:sg"]);
        assert!(u.is_unified(&noun, &noun.readings()[0], &number(), true, true));
        assert_eq!(u.final_unified_tokens().unwrap().len(), 3);
    }

    #[test]
    fn missing_equivalence_fails_closed() {
        let registry = registry();
        let features = UnifyFeatures::new().feature("case");
        let mut u = registry.start_run();
        let results = run(
            &mut u,
            &[token("der", &["DET:sg"]), token("Mann", &["NOUN:sg"])],
            &features,
        );
        assert_eq!(results, vec![false, false]);
        assert!(!u.final_unification_value());

        let bogus = UnifyFeatures::new().feature_types("number", &["dual"]);
        let mut u = registry.start_run();
        let det = token("der", &["DET:sg"]);
        assert!(!u.is_unified(&det, &det.readings()[0], &bogus, true, true));
    }

    #[test]
    fn reset_allows_reuse() {
        let registry = registry();
        let mut u = registry.start_run();
        run(
            &mut u,
            &[token("der", &["DET:sg"]), token("Männer", &["NOUN:pl"])],
            &number(),
        );
        assert!(!u.final_unification_value());
        u.reset();
        assert!(!u.is_unifying());
        let results = run(
            &mut u,
            &[token("die", &["DET:pl"]), token("Männer", &["NOUN:pl"])],
            &number(),
        );
        assert_eq!(results, vec![true, true]);
    }

    #[test]
    fn validate_names() {
        let registry = registry();
        assert!(registry.validate(&number()).is_ok());
        assert_eq!(
            registry.validate(&UnifyFeatures::new().feature("case")),
            Err(CompileError::UnknownFeature("case".to_string()))
        );
        assert_eq!(
            registry.validate(&UnifyFeatures::new().feature_types("number", &["dual"])),
            Err(CompileError::UnknownEquivalence {
                feature: "number".to_string(),
                type_name: "dual".to_string(),
            })
        );
        assert_eq!(registry.types_of("number"), Some(vec!["singular", "plural"]));
    }
}
