//! Tokens and sentences as handed over by the tagger.
//!
//! All offsets are **character** (not byte) indices into the checked text.

use crate::reading::{PARA_END_TAG, Reading, SENT_END_TAG, SENT_START_TAG};

/// One position in a sentence together with all of its readings.
///
/// A token always carries at least one reading; words the tagger could not
/// analyse get a single reading with unset lemma and tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub surface: String,
    readings: Vec<Reading>,
    /// Character offset of the first character of `surface`.
    pub start: usize,
    pub whitespace_before: bool,
    sentence_start: bool,
}

impl Token {
    /// Create a token from its readings.
    ///
    /// An empty `readings` vector is replaced by one untagged reading of
    /// `surface`.
    pub fn new(surface: &str, readings: Vec<Reading>, start: usize) -> Self {
        let readings = if readings.is_empty() {
            vec![Reading::untagged(surface)]
        } else {
            readings
        };
        Self {
            surface: surface.to_string(),
            readings,
            start,
            whitespace_before: false,
            sentence_start: false,
        }
    }

    /// Create a token with a single reading.
    pub fn with_reading(surface: &str, lemma: &str, tag: &str, start: usize) -> Self {
        Self::new(surface, vec![Reading::new(surface, lemma, tag)], start)
    }

    /// The synthetic token that opens every sentence.
    pub fn sentence_start() -> Self {
        Self {
            surface: String::new(),
            readings: vec![Reading {
                surface: String::new(),
                lemma: None,
                tag: Some(SENT_START_TAG.to_string()),
            }],
            start: 0,
            whitespace_before: false,
            sentence_start: true,
        }
    }

    /// Builder-style setter for the preceding-whitespace flag.
    pub fn with_whitespace_before(mut self, whitespace: bool) -> Self {
        self.whitespace_before = whitespace;
        self
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Add a reading unless a compatible one is already present.
    pub fn add_reading(&mut self, reading: Reading) {
        if !self.readings.iter().any(|r| r.is_compatible(&reading)) {
            self.readings.push(reading);
        }
    }

    /// Keep only the readings for which `keep` returns true.
    ///
    /// The token keeps its first reading if nothing would remain.
    pub fn retain_readings(&mut self, mut keep: impl FnMut(&Reading) -> bool) {
        let first = self.readings[0].clone();
        self.readings.retain(|r| keep(r));
        if self.readings.is_empty() {
            self.readings.push(first);
        }
    }

    /// Character offset just past the end of the surface form.
    pub fn end(&self) -> usize {
        self.start + self.surface.chars().count()
    }

    pub fn is_sentence_start(&self) -> bool {
        self.sentence_start
    }

    pub fn is_sentence_end(&self) -> bool {
        self.has_tag(SENT_END_TAG)
    }

    pub fn is_paragraph_end(&self) -> bool {
        self.has_tag(PARA_END_TAG)
    }

    /// True if any reading carries exactly `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.readings.iter().any(|r| r.tag() == Some(tag))
    }
}

/// A tagged sentence: the synthetic start token followed by word tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    tokens: Vec<Token>,
}

impl Sentence {
    /// Wrap tagged tokens, prepending the sentence-start token if the tagger
    /// did not supply one.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.first().is_some_and(Token::is_sentence_start) {
            tokens.insert(0, Token::sentence_start());
        }
        Self { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Reassemble the covered text from surfaces and whitespace flags.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            if token.whitespace_before && !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&token.surface);
        }
        out
    }
}
