//! Pattern matching over tagged tokens.
//!
//! A pattern is a sequence of [`MatchElement`]s, each describing the token
//! acceptable at one position. A token is accepted if one of its readings
//! satisfies the element and no exception applies.
//!
//! # Element constraints
//!
//! | Constraint             | Meaning                                               |
//! |------------------------|-------------------------------------------------------|
//! | `text` / `regex`       | Surface (or lemma) equals literal / matches regex     |
//! | `negate`               | String constraint must *not* hold                     |
//! | `tag` / `tag_regex`    | Tag equals literal / matches regex (`UNKNOWN` = none) |
//! | `negate_tag`           | Tag constraint must *not* hold                        |
//! | `inflected`            | Lemma differs from surface                            |
//! | `whitespace_before`    | Token is (not) preceded by whitespace                 |
//! | `and` / `or`           | Sub-elements tested against the same reading          |
//! | `exception`            | Disqualifies the token if any reading matches         |
//! | `exception_next`       | Vetoes the tokens following this element's match      |
//! | `exception_previous`   | Vetoes the match if the preceding token matches       |
//! | `skip(n)`              | Up to n tokens may precede the match (-1 = any)       |
//! | `min/max_occurrence`   | Element may be omitted / repeated                     |
//! | `sentence_start`       | Matches only the synthetic first token                |
//! | `back_reference(i, f)` | Pattern built from element i's token at match time    |
//! | `unify(features)`      | Readings must agree with the rest of the block        |

pub mod element;
mod evaluate;
pub mod matcher;
pub mod text_matcher;


pub use element::{BackReference, ElementBuilder, MAX_COUNT, MatchElement, Occurrence, Skip};
pub use matcher::{ElementSpan, MAX_STEPS, MatchContext, Pattern, PatternMatch, find_all, match_at};
pub use text_matcher::{StringMatcher, TagMatcher};
