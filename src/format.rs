//! Formatting matched tokens into replacement text.
//!
//! A [`MatchFormatter`] is bound to a rule at compile time and evaluated
//! afresh for every match. The order of operations is:
//!
//! 1. take the matched token (or a synthetic token built from a static lemma),
//! 2. rewrite its surface with the string regex,
//! 3. generate forms for the target tag, if any,
//! 4. apply the case conversion,
//! 5. add the text of tokens skipped after the match.
//!
//! Generated forms are kept sorted so the output never depends on the order
//! the synthesizer happens to return them in.

use std::borrow::Cow;
use std::collections::BTreeSet;

use itertools::Itertools;
use phf::{Map, phf_map};
use regex::Regex;
use tracing::debug;

use crate::error::{CompileError, full_match_regex, search_regex};
use crate::reading::Reading;
use crate::synthesis::Synthesizer;
use crate::token::Token;

/// Case change applied to every candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaseConversion {
    #[default]
    None,
    StartLower,
    StartUpper,
    AllLower,
    AllUpper,
    /// Copy the casing of the matched token (all caps or initial capital).
    Preserve,
}

const CASE_CONVERSION_NAMES: Map<&'static str, CaseConversion> = phf_map! {
    "none" => CaseConversion::None,
    "startlower" => CaseConversion::StartLower,
    "startupper" => CaseConversion::StartUpper,
    "alllower" => CaseConversion::AllLower,
    "allupper" => CaseConversion::AllUpper,
    "preserve" => CaseConversion::Preserve,
};

impl CaseConversion {
    /// Look up a conversion by its rule-file name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        CASE_CONVERSION_NAMES
            .get(name.to_ascii_lowercase().as_str())
            .copied()
    }

    /// Convert `text`; `sample` is the matched surface, used by `Preserve`.
    pub fn apply(&self, text: &str, sample: &str) -> String {
        match self {
            Self::None => text.to_string(),
            Self::StartLower => map_first(text, |c| c.to_lowercase().collect()),
            Self::StartUpper => map_first(text, |c| c.to_uppercase().collect()),
            Self::AllLower => text.to_lowercase(),
            Self::AllUpper => text.to_uppercase(),
            Self::Preserve => {
                if !starts_with_uppercase(sample) {
                    text.to_string()
                } else if is_all_uppercase(sample) {
                    text.to_uppercase()
                } else {
                    map_first(text, |c| c.to_uppercase().collect())
                }
            }
        }
    }
}

fn map_first(text: &str, convert: impl Fn(char) -> String) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => convert(first) + chars.as_str(),
        None => String::new(),
    }
}

fn starts_with_uppercase(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_uppercase)
}

/// True if the text has letters and none of them is lowercase.
fn is_all_uppercase(text: &str) -> bool {
    text.chars().any(char::is_alphabetic) && !text.chars().any(char::is_lowercase)
}

/// Which skipped tokens a suggestion re-incorporates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IncludeSkipped {
    #[default]
    None,
    /// Only the skipped tokens, without the matched token itself.
    FollowingOnly,
    /// The matched token followed by the skipped tokens.
    All,
}

const INCLUDE_SKIPPED_NAMES: Map<&'static str, IncludeSkipped> = phf_map! {
    "none" => IncludeSkipped::None,
    "following" => IncludeSkipped::FollowingOnly,
    "all" => IncludeSkipped::All,
};

impl IncludeSkipped {
    pub fn from_name(name: &str) -> Option<Self> {
        INCLUDE_SKIPPED_NAMES
            .get(name.to_ascii_lowercase().as_str())
            .copied()
    }
}

/// Compiled recipe for the replacement text of one matched token.
#[derive(Debug, Clone, Default)]
pub struct MatchFormatter {
    target_tag: Option<String>,
    /// Compiled `target_tag` when the tag is a regular expression.
    tag_regex: Option<Regex>,
    tag_replace: Option<String>,
    string_regex: Option<Regex>,
    string_replace: String,
    case_conversion: CaseConversion,
    sets_tag: bool,
    include_skipped: IncludeSkipped,
    static_lemma: Option<String>,
}

impl MatchFormatter {
    pub fn builder() -> FormatterBuilder {
        FormatterBuilder::default()
    }

    /// Formatter that copies the matched surface unchanged.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn sets_tag(&self) -> bool {
        self.sets_tag
    }

    pub fn has_target_tag(&self) -> bool {
        self.target_tag.is_some()
    }

    pub fn is_tag_regex(&self) -> bool {
        self.tag_regex.is_some()
    }

    pub fn case_conversion(&self) -> CaseConversion {
        self.case_conversion
    }

    /// Replacement candidates for `token`.
    ///
    /// `skipped` are the tokens between `token` and the next matched
    /// element. Never empty: if generation fails the original surface is
    /// returned in parentheses.
    pub fn format(
        &self,
        token: &Token,
        skipped: &[Token],
        synth: Option<&dyn Synthesizer>,
    ) -> Vec<String> {
        let source: Cow<'_, Token> = match &self.static_lemma {
            Some(lemma) => Cow::Owned(Token::new(
                lemma,
                vec![Reading {
                    surface: lemma.clone(),
                    lemma: Some(lemma.clone()),
                    tag: self.target_tag.clone(),
                }],
                token.start,
            )),
            None => Cow::Borrowed(token),
        };

        let surface = match &self.string_regex {
            Some(re) => re
                .replace_all(&source.surface, self.string_replace.as_str())
                .into_owned(),
            None => source.surface.clone(),
        };

        let mut candidates = match &self.target_tag {
            Some(target) => self.generate(&source, token, target, &surface, synth),
            None => vec![surface],
        };

        for candidate in &mut candidates {
            *candidate = self.case_conversion.apply(candidate, &token.surface);
        }

        if !skipped.is_empty() {
            match self.include_skipped {
                IncludeSkipped::None => {}
                IncludeSkipped::All => {
                    let tail = skipped_text(skipped, false);
                    for candidate in &mut candidates {
                        candidate.push_str(&tail);
                    }
                }
                IncludeSkipped::FollowingOnly => candidates = vec![skipped_text(skipped, true)],
            }
        }

        candidates.into_iter().unique().collect()
    }

    /// Forms of `source` for the target tag, sorted and deduplicated.
    fn generate(
        &self,
        source: &Token,
        matched: &Token,
        target: &str,
        surface: &str,
        synth: Option<&dyn Synthesizer>,
    ) -> Vec<String> {
        let Some(synth) = synth else {
            return vec![surface.to_string()];
        };
        // The token already carries the tag: nothing to generate.
        if self.tag_regex.is_none()
            && self.tag_replace.is_none()
            && self.static_lemma.is_none()
            && matched.has_tag(target)
        {
            return vec![surface.to_string()];
        }
        // Punctuation, sentinels and unknown words have nothing to inflect.
        if source
            .readings()
            .iter()
            .all(|r| r.lemma.is_none() && (r.has_no_tag() || r.is_sentinel()))
        {
            return vec![surface.to_string()];
        }

        let (tag, is_regex) = match self.target_tag(matched, Some(synth)) {
            Some(tag) if self.is_tag_regex() => (tag, true),
            _ => (target.to_string(), false),
        };
        let mut forms = BTreeSet::new();
        for reading in source.readings().iter().filter(|r| r.lemma.is_some()) {
            match synth.synthesize(reading, &tag, is_regex) {
                Ok(generated) => forms.extend(generated),
                Err(err) => debug!(
                    surface = %matched.surface,
                    tag = %tag,
                    error = %err,
                    "synthesis failed"
                ),
            }
        }
        if forms.is_empty() {
            vec![format!("({})", matched.surface)]
        } else {
            forms.into_iter().collect()
        }
    }

    /// Effective target tag for `matched`.
    ///
    /// A literal tag is returned as is. A regex tag is applied to every
    /// matching tag of the token (or to itself if none match) and rewritten
    /// with `tag_replace`; the results are joined with `|`.
    pub fn target_tag(&self, matched: &Token, synth: Option<&dyn Synthesizer>) -> Option<String> {
        let target = self.target_tag.as_ref()?;
        let Some(re) = &self.tag_regex else {
            return Some(target.clone());
        };
        let mut tags: Vec<&str> = matched
            .readings()
            .iter()
            .filter_map(Reading::tag)
            .filter(|tag| re.is_match(tag))
            .unique()
            .collect();
        if tags.is_empty() {
            tags.push(target);
        }
        let Some(replace) = &self.tag_replace else {
            return Some(tags.join("|"));
        };
        let joined = tags
            .iter()
            .map(|tag| {
                let rewritten = re.replace_all(tag, replace.as_str()).into_owned();
                match synth {
                    Some(synth) if self.sets_tag => synth.tag_correction(&rewritten),
                    _ => rewritten,
                }
            })
            .unique()
            .join("|");
        Some(joined)
    }
}

/// Text of the skipped tokens with their original spacing.
///
/// With `drop_leading_space`, the first token's preceding space is omitted.
fn skipped_text(skipped: &[Token], drop_leading_space: bool) -> String {
    let mut out = String::new();
    for (k, token) in skipped.iter().enumerate() {
        if token.whitespace_before && !(k == 0 && drop_leading_space) {
            out.push(' ');
        }
        out.push_str(&token.surface);
    }
    out
}

/// Uncompiled description of a [`MatchFormatter`].
#[derive(Debug, Clone, Default)]
pub struct FormatterBuilder {
    target_tag: Option<String>,
    tag_is_regex: bool,
    tag_replace: Option<String>,
    string_regex: Option<String>,
    string_replace: String,
    case_conversion: CaseConversion,
    sets_tag: bool,
    include_skipped: IncludeSkipped,
    static_lemma: Option<String>,
}

impl FormatterBuilder {
    pub fn target_tag(mut self, tag: &str) -> Self {
        self.target_tag = Some(tag.to_string());
        self.tag_is_regex = false;
        self
    }

    /// Regex target tag, optionally rewritten with `replace` (`$1` etc.).
    pub fn target_tag_regex(mut self, pattern: &str, replace: Option<&str>) -> Self {
        self.target_tag = Some(pattern.to_string());
        self.tag_is_regex = true;
        self.tag_replace = replace.map(str::to_string);
        self
    }

    /// Rewrite the surface form: every match of `pattern` becomes `replace`.
    pub fn string_regex(mut self, pattern: &str, replace: &str) -> Self {
        self.string_regex = Some(pattern.to_string());
        self.string_replace = replace.to_string();
        self
    }

    pub fn case_conversion(mut self, conversion: CaseConversion) -> Self {
        self.case_conversion = conversion;
        self
    }

    /// The computed tag is the formatter's result (used by back-references
    /// that transfer a tag rather than a word).
    pub fn sets_tag(mut self) -> Self {
        self.sets_tag = true;
        self
    }

    pub fn include_skipped(mut self, include: IncludeSkipped) -> Self {
        self.include_skipped = include;
        self
    }

    pub fn static_lemma(mut self, lemma: &str) -> Self {
        self.static_lemma = Some(lemma.to_string());
        self
    }

    pub fn build(self) -> Result<MatchFormatter, CompileError> {
        let tag_regex = match &self.target_tag {
            Some(tag) if self.tag_is_regex => Some(full_match_regex(tag, true)?),
            _ => None,
        };
        let string_regex = self.string_regex.as_deref().map(search_regex).transpose()?;
        Ok(MatchFormatter {
            target_tag: self.target_tag,
            tag_regex,
            tag_replace: self.tag_replace,
            string_regex,
            string_replace: self.string_replace,
            case_conversion: self.case_conversion,
            sets_tag: self.sets_tag,
            include_skipped: self.include_skipped,
            static_lemma: self.static_lemma,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Synthesizer over a fixed (lemma, tag) table.
    struct Table {
        forms: HashMap<(&'static str, &'static str), Vec<&'static str>>,
    }

    impl Table {
        fn german() -> Self {
            let mut forms = HashMap::new();
            forms.insert(("Mann", "NOUN:pl"), vec!["Männer"]);
            forms.insert(("Mann", "NOUN:sg"), vec!["Mann"]);
            forms.insert(("gut", "ADJ:pl"), vec!["gute", "guten"]);
            forms.insert(("wider", "ADV"), vec!["wider"]);
            Self { forms }
        }
    }

    impl Synthesizer for Table {
        fn synthesize(&self, reading: &Reading, target_tag: &str, is_regex: bool) -> anyhow::Result<Vec<String>> {
            let Some(lemma) = reading.lemma() else {
                return Ok(vec![]);
            };
            if lemma == "kaputt" {
                anyhow::bail!("dictionary unavailable");
            }
            let mut out = Vec::new();
            for ((l, tag), forms) in &self.forms {
                let tag_ok = if is_regex {
                    target_tag.split('|').any(|t| t == *tag)
                } else {
                    target_tag == *tag
                };
                if *l == lemma && tag_ok {
                    out.extend(forms.iter().rev().map(|f| f.to_string()));
                }
            }
            Ok(out)
        }
    }

    fn noun(surface: &str, lemma: &str, tag: &str) -> Token {
        Token::with_reading(surface, lemma, tag, 0)
    }

    // --- Case conversion ---

    #[test]
    fn case_conversions() {
        assert_eq!(CaseConversion::StartUpper.apply("wieder", ""), "Wieder");
        assert_eq!(CaseConversion::StartLower.apply("Wieder", ""), "wieder");
        assert_eq!(CaseConversion::AllUpper.apply("straße", ""), "STRASSE");
        assert_eq!(CaseConversion::AllLower.apply("WIEDER", ""), "wieder");
        assert_eq!(CaseConversion::None.apply("WiEdEr", ""), "WiEdEr");
        assert_eq!(CaseConversion::StartUpper.apply("", ""), "");
    }

    #[test]
    fn preserve_copies_sample_casing() {
        assert_eq!(CaseConversion::Preserve.apply("wider", "Wieder"), "Wider");
        assert_eq!(CaseConversion::Preserve.apply("wider", "WIEDER"), "WIDER");
        assert_eq!(CaseConversion::Preserve.apply("wider", "wieder"), "wider");
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(CaseConversion::from_name("StartUpper"), Some(CaseConversion::StartUpper));
        assert_eq!(CaseConversion::from_name("bogus"), None);
        assert_eq!(IncludeSkipped::from_name("following"), Some(IncludeSkipped::FollowingOnly));
    }

    // --- Surface rewriting ---

    #[test]
    fn identity_copies_surface() {
        let t = noun("Mann", "Mann", "NOUN:sg");
        assert_eq!(MatchFormatter::identity().format(&t, &[], None), vec!["Mann"]);
    }

    #[test]
    fn string_regex_then_case() {
        let f = MatchFormatter::builder()
            .string_regex("ie", "i")
            .case_conversion(CaseConversion::AllUpper)
            .build()
            .unwrap();
        let t = noun("wieder", "wieder", "ADV");
        assert_eq!(f.format(&t, &[], None), vec!["WIDER"]);
    }

    #[test]
    fn static_lemma_without_tag() {
        let f = MatchFormatter::builder().static_lemma("wider").build().unwrap();
        let t = noun("wieder", "wieder", "ADV");
        assert_eq!(f.format(&t, &[], None), vec!["wider"]);
    }

    // --- Synthesis ---

    #[test]
    fn literal_tag_synthesis() {
        let f = MatchFormatter::builder().target_tag("NOUN:pl").build().unwrap();
        let t = noun("Mann", "Mann", "NOUN:sg");
        assert_eq!(f.format(&t, &[], Some(&Table::german())), vec!["Männer"]);
    }

    #[test]
    fn own_tag_needs_no_synthesis() {
        let f = MatchFormatter::builder().target_tag("NOUN:sg").build().unwrap();
        let t = noun("Mann", "Mann", "NOUN:sg");
        assert_eq!(f.format(&t, &[], Some(&Table::german())), vec!["Mann"]);
    }

    #[test]
    fn regex_tag_with_replace() {
        let f = MatchFormatter::builder()
            .target_tag_regex("ADJ:(.*)", Some("ADJ:pl"))
            .build()
            .unwrap();
        let t = noun("guter", "gut", "ADJ:sg");
        assert_eq!(f.target_tag(&t, None).as_deref(), Some("ADJ:pl"));
        // Sorted, not in synthesizer order.
        assert_eq!(f.format(&t, &[], Some(&Table::german())), vec!["gute", "guten"]);
    }

    #[test]
    fn regex_tag_joins_alternatives() {
        let f = MatchFormatter::builder()
            .target_tag_regex("DET:(sg|pl)", Some("ADJ:$1"))
            .build()
            .unwrap();
        let t = Token::new(
            "die",
            vec![
                Reading::new("die", "der", "DET:sg"),
                Reading::new("die", "der", "DET:pl"),
            ],
            0,
        );
        assert_eq!(f.target_tag(&t, None).as_deref(), Some("ADJ:sg|ADJ:pl"));
    }

    #[test]
    fn failed_generation_is_bracketed() {
        let f = MatchFormatter::builder().target_tag("VERB:past").build().unwrap();
        let t = noun("Mann", "Mann", "NOUN:sg");
        assert_eq!(f.format(&t, &[], Some(&Table::german())), vec!["(Mann)"]);
        let broken = noun("kaputt", "kaputt", "ADJ");
        assert_eq!(f.format(&broken, &[], Some(&Table::german())), vec!["(kaputt)"]);
    }

    #[test]
    fn no_synthesizer_keeps_surface() {
        let f = MatchFormatter::builder().target_tag("NOUN:pl").build().unwrap();
        let t = noun("Mann", "Mann", "NOUN:sg");
        assert_eq!(f.format(&t, &[], None), vec!["Mann"]);
    }

    #[test]
    fn untagged_tokens_are_not_inflected() {
        let f = MatchFormatter::builder().target_tag("NOUN:pl").build().unwrap();
        let t = Token::new("Xyz", vec![], 0);
        assert_eq!(f.format(&t, &[], Some(&Table::german())), vec!["Xyz"]);
    }

    // --- Skipped tokens ---

    fn gap() -> Vec<Token> {
        vec![
            noun("die", "der", "DET").with_whitespace_before(true),
            noun("Lage", "Lage", "NOUN").with_whitespace_before(true),
        ]
    }

    #[test]
    fn include_all_skipped() {
        let f = MatchFormatter::builder()
            .include_skipped(IncludeSkipped::All)
            .build()
            .unwrap();
        let t = noun("spiegelt", "spiegeln", "VERB");
        assert_eq!(f.format(&t, &gap(), None), vec!["spiegelt die Lage"]);
        assert_eq!(f.format(&t, &[], None), vec!["spiegelt"]);
    }

    #[test]
    fn include_following_only() {
        let f = MatchFormatter::builder()
            .include_skipped(IncludeSkipped::FollowingOnly)
            .build()
            .unwrap();
        let t = noun("spiegelt", "spiegeln", "VERB");
        assert_eq!(f.format(&t, &gap(), None), vec!["die Lage"]);
    }

    #[test]
    fn output_is_stable() {
        let f = MatchFormatter::builder()
            .target_tag_regex("ADJ:.*", Some("ADJ:pl"))
            .build()
            .unwrap();
        let t = noun("guter", "gut", "ADJ:sg");
        let synth = Table::german();
        let first = f.format(&t, &[], Some(&synth));
        for _ in 0..10 {
            assert_eq!(f.format(&t, &[], Some(&synth)), first);
        }
    }
}
