//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use grammatch::{EquivalenceRegistry, MatchElement, Reading, Sentence, Synthesizer, Token};
use regex::Regex;

/// Synthesizer backed by a fixed (lemma, tag, form) table.
pub struct TableSynthesizer {
    entries: Vec<(String, String, String)>,
}

impl TableSynthesizer {
    pub fn new(entries: &[(&str, &str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(lemma, tag, form)| (lemma.to_string(), tag.to_string(), form.to_string()))
                .collect(),
        }
    }

    pub fn german() -> Self {
        Self::new(&[
            ("der", "DET:pl", "die"),
            ("der", "DET:sg", "der"),
            ("der", "ART:sg:fem", "eine"),
            ("der", "ART:pl:fem", "keine"),
            ("Mann", "NOUN:pl", "Männer"),
            ("Mann", "NOUN:sg", "Mann"),
            ("gut", "ADJ:pl", "guten"),
            ("gut", "ADJ:pl", "gute"),
        ])
    }
}

impl Synthesizer for TableSynthesizer {
    fn synthesize(&self, reading: &Reading, target_tag: &str, is_regex: bool) -> anyhow::Result<Vec<String>> {
        let Some(lemma) = reading.lemma() else {
            return Ok(Vec::new());
        };
        let pattern = Regex::new(&format!("^(?:{target_tag})$"))?;
        Ok(self
            .entries
            .iter()
            .filter(|(l, tag, _)| {
                l == lemma && if is_regex { pattern.is_match(tag) } else { tag == target_tag }
            })
            .map(|(_, _, form)| form.clone())
            .collect())
    }
}

/// Number and gender equivalences over `CAT:number:gender` tags.
pub fn registry() -> EquivalenceRegistry {
    let mut registry = EquivalenceRegistry::new();
    let tag = |pattern: &str| {
        MatchElement::builder()
            .tag_regex(pattern)
            .build()
            .expect("valid equivalence pattern")
    };
    registry
        .define("number", "singular", tag(".*:sg(:.*)?"))
        .define("number", "plural", tag(".*:pl(:.*)?"))
        .define("gender", "masc", tag(".*:masc"))
        .define("gender", "fem", tag(".*:fem"));
    registry
}

/// Sentence of tokens with one reading each, separated by single spaces.
pub fn sentence(words: &[(&str, &str, &str)]) -> Sentence {
    sentence_of(
        words
            .iter()
            .map(|(surface, lemma, tag)| (*surface, vec![Reading::new(surface, lemma, tag)]))
            .collect(),
    )
}

/// Sentence of tokens with the given readings, separated by single spaces.
pub fn sentence_of(words: Vec<(&str, Vec<Reading>)>) -> Sentence {
    let mut offset = 0;
    let mut tokens = Vec::new();
    for (i, (surface, readings)) in words.into_iter().enumerate() {
        if i > 0 {
            offset += 1;
        }
        tokens.push(Token::new(surface, readings, offset).with_whitespace_before(i > 0));
        offset += surface.chars().count();
    }
    Sentence::new(tokens)
}

/// Readings of `surface` for each (lemma, tag).
pub fn readings(surface: &str, analyses: &[(&str, &str)]) -> Vec<Reading> {
    analyses
        .iter()
        .map(|(lemma, tag)| Reading::new(surface, lemma, tag))
        .collect()
}

/// Untagged words.
pub fn words(text: &str) -> Sentence {
    sentence_of(text.split(' ').map(|w| (w, Vec::new())).collect())
}
