//! A single interpretation of a token: surface form, lemma and tag.

/// Tag carried by the synthetic reading of the sentence-start token.
pub const SENT_START_TAG: &str = "SENT_START";
/// Tag marking the last token of a sentence.
pub const SENT_END_TAG: &str = "SENT_END";
/// Tag marking the last token of a paragraph.
pub const PARA_END_TAG: &str = "PARA_END";
/// Tag name a tag constraint uses to accept readings without any tag.
pub const UNKNOWN_TAG: &str = "UNKNOWN";

/// One candidate interpretation of a token, as produced by the tagger.
///
/// `lemma` and `tag` are unset for words the tagger could not analyse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reading {
    pub surface: String,
    pub lemma: Option<String>,
    pub tag: Option<String>,
}

impl Reading {
    /// Create a fully analysed reading.
    pub fn new(surface: &str, lemma: &str, tag: &str) -> Self {
        Self {
            surface: surface.to_string(),
            lemma: Some(lemma.to_string()),
            tag: Some(tag.to_string()),
        }
    }

    /// Create a reading with no lemma and no tag.
    pub fn untagged(surface: &str) -> Self {
        Self {
            surface: surface.to_string(),
            lemma: None,
            tag: None,
        }
    }

    pub fn lemma(&self) -> Option<&str> {
        self.lemma.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// True if the reading has no tag.
    pub fn has_no_tag(&self) -> bool {
        self.tag.is_none()
    }

    /// True if the tag is one of the sentence/paragraph sentinel tags.
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self.tag.as_deref(),
            Some(SENT_START_TAG) | Some(SENT_END_TAG) | Some(PARA_END_TAG)
        )
    }

    /// True if the lemma is set and differs from the surface form.
    pub fn is_inflected(&self) -> bool {
        self.lemma.as_deref().is_some_and(|lemma| lemma != self.surface)
    }

    /// Two readings are compatible when every field set on both agrees.
    ///
    /// An unset lemma or tag acts as a wildcard.
    pub fn is_compatible(&self, other: &Reading) -> bool {
        fn field_ok(a: Option<&str>, b: Option<&str>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }
        self.surface == other.surface
            && field_ok(self.lemma(), other.lemma())
            && field_ok(self.tag(), other.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflected_needs_a_differing_lemma() {
        assert!(Reading::new("Männer", "Mann", "NOUN:pl").is_inflected());
        assert!(!Reading::new("Mann", "Mann", "NOUN:sg").is_inflected());
        assert!(!Reading::untagged("Mann").is_inflected());
    }

    #[test]
    fn unset_fields_are_wildcards() {
        let full = Reading::new("der", "der", "DET:sg");
        let bare = Reading::untagged("der");
        assert!(full.is_compatible(&bare));
        assert!(bare.is_compatible(&full));
    }

    #[test]
    fn differing_tags_are_incompatible() {
        let a = Reading::new("der", "der", "DET:sg");
        let b = Reading::new("der", "der", "DET:pl");
        assert!(!a.is_compatible(&b));
        assert!(!a.is_compatible(&Reading::untagged("die")));
    }

    #[test]
    fn sentinel_tags() {
        let r = Reading {
            surface: String::new(),
            lemma: None,
            tag: Some(SENT_START_TAG.to_string()),
        };
        assert!(r.is_sentinel());
        assert!(!Reading::new("a", "a", "DET").is_sentinel());
    }
}
