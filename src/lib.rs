//! Pattern matching and feature unification over ambiguous, morphologically
//! tagged tokens.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use grammatch::{EquivalenceRegistry, MatchElement, Rule, RuleSet, Sentence, Token, UnifyFeatures};
//!
//! let mut registry = EquivalenceRegistry::new();
//! registry
//!     .define("number", "singular", MatchElement::builder().tag_regex(".*:sg").build()?)
//!     .define("number", "plural", MatchElement::builder().tag_regex(".*:pl").build()?);
//!
//! let number = UnifyFeatures::new().feature("number");
//! let rule = Rule::builder("DET_NOUN_AGREEMENT")
//!     .element(MatchElement::builder().tag_regex("DET.*").unify(number.clone()).uni_negated())
//!     .element(MatchElement::builder().tag_regex("NOUN.*").unify(number).uni_negated())
//!     .message("'\\1' does not agree with '\\2'");
//!
//! let (rules, rejected) = RuleSet::load(Arc::new(registry), [rule]);
//! assert!(rejected.is_empty());
//!
//! let sentence = Sentence::new(vec![
//!     Token::with_reading("der", "der", "DET:sg", 0),
//!     Token::with_reading("Männer", "Mann", "NOUN:pl", 4).with_whitespace_before(true),
//! ]);
//! let found = rules.check(&sentence, None);
//!
//! assert_eq!(found.len(), 1);
//! assert_eq!((found[0].start_offset, found[0].end_offset), (0, 10));
//! assert_eq!(found[0].message, "'der' does not agree with 'Männer'");
//! # Ok::<(), grammatch::CompileError>(())
//! ```

pub mod error;
pub mod format;
pub mod pattern;
pub mod reading;
pub mod rule;
pub mod rule_set;
pub mod synthesis;
pub mod token;
pub mod unifier;

pub use error::CompileError;
pub use format::{CaseConversion, FormatterBuilder, IncludeSkipped, MatchFormatter};
pub use pattern::{ElementBuilder, MatchContext, MatchElement, Pattern, PatternMatch};
pub use reading::Reading;
pub use rule::{MatchRef, Rule, RuleBuilder, RuleMatch, Suggestion, SuggestionBuilder, SuggestionPart};
pub use rule_set::{MatchOptions, RuleSet};
pub use synthesis::Synthesizer;
pub use token::{Sentence, Token};
pub use unifier::{EquivalenceRegistry, Unifier, UnifyFeatures};
