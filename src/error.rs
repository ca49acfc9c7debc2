//! Errors raised while compiling rules.
//!
//! Matching itself never fails: a sentence either matches or it does not.

/// A fault in a compiled rule, detected at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    EmptyPattern,
    InvalidRegex { pattern: String, message: String },
    InvalidSkip(i32),
    InvalidOccurrence { min: u8, max: i32 },
    BackReferenceOutOfRange { element: usize, index: usize },
    BackReferenceToOptional { element: usize, index: usize },
    MissingPlaceholder { element: usize, index: usize },
    MissingTargetTag { element: usize },
    SuggestionOutOfRange { index: usize },
    UnknownFeature(String),
    UnknownEquivalence { feature: String, type_name: String },
    PositionCorrection { start: usize, end: usize, len: usize },
    RuleRejected { rule_id: String, source: Box<CompileError> },
}

impl CompileError {
    /// Attach the id of the rule being compiled.
    pub fn in_rule(self, rule_id: &str) -> Self {
        match self {
            Self::RuleRejected { .. } => self,
            other => Self::RuleRejected {
                rule_id: rule_id.to_string(),
                source: Box::new(other),
            },
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPattern => write!(f, "Pattern has no elements"),
            Self::InvalidRegex { pattern, message } => {
                write!(f, "Invalid regular expression {pattern:?}: {message}")
            }
            Self::InvalidSkip(n) => write!(f, "Skip must be between -1 and 127, got {n}"),
            Self::InvalidOccurrence { min, max } => {
                write!(f, "Invalid occurrence range min={min} max={max}")
            }
            Self::BackReferenceOutOfRange { element, index } => write!(
                f,
                "Element {element} refers to element {index}, which is not an earlier element"
            ),
            Self::BackReferenceToOptional { element, index } => write!(
                f,
                "Element {element} refers to element {index}, which may be omitted"
            ),
            Self::MissingPlaceholder { element, index } => write!(
                f,
                "Element {element} refers to element {index} but its pattern has no \\{index} placeholder"
            ),
            Self::MissingTargetTag { element } => write!(
                f,
                "Element {element} takes its tag from a back-reference whose formatter has no target tag"
            ),
            Self::SuggestionOutOfRange { index } => {
                write!(f, "Suggestion refers to element {index}, which does not exist")
            }
            Self::UnknownFeature(feature) => {
                write!(f, "Unification feature {feature:?} has no equivalence types")
            }
            Self::UnknownEquivalence { feature, type_name } => write!(
                f,
                "No equivalence defined for feature {feature:?}, type {type_name:?}"
            ),
            Self::PositionCorrection { start, end, len } => write!(
                f,
                "Position corrections start={start} end={end} leave nothing of a {len}-element pattern"
            ),
            Self::RuleRejected { rule_id, source } => write!(f, "Rule {rule_id}: {source}"),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RuleRejected { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Compile `pattern` as a whole-string regular expression.
pub(crate) fn full_match_regex(
    pattern: &str,
    case_sensitive: bool,
) -> Result<regex::Regex, CompileError> {
    regex::RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|err| CompileError::InvalidRegex {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })
}

/// Compile `pattern` as a search (unanchored) regular expression.
pub(crate) fn search_regex(pattern: &str) -> Result<regex::Regex, CompileError> {
    regex::Regex::new(pattern).map_err(|err| CompileError::InvalidRegex {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_context_wraps_once() {
        let err = CompileError::InvalidSkip(-4).in_rule("R1").in_rule("R2");
        assert_eq!(err.to_string(), "Rule R1: Skip must be between -1 and 127, got -4");
    }

    #[test]
    fn full_match_is_anchored() {
        let re = full_match_regex("ab|cd", true).unwrap();
        assert!(re.is_match("cd"));
        assert!(!re.is_match("abcd"));
        assert!(!re.is_match("xab"));
    }

    #[test]
    fn full_match_case_folding() {
        let re = full_match_regex("wieder", false).unwrap();
        assert!(re.is_match("Wieder"));
        let re = full_match_regex("wieder", true).unwrap();
        assert!(!re.is_match("Wieder"));
    }

    #[test]
    fn bad_regex_reports_pattern() {
        let err = full_match_regex("(", true).unwrap_err();
        assert!(matches!(err, CompileError::InvalidRegex { ref pattern, .. } if pattern == "("));
    }
}
