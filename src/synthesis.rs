//! Interface to the morphological generator used when formatting
//! suggestions.

use crate::reading::Reading;

/// Generates surface forms for a lemma and a target tag.
///
/// Implementations must return an empty vector, not an error, when the tag
/// yields no forms. Errors are reserved for genuine failures (a broken
/// dictionary, say); the formatter recovers from them locally.
pub trait Synthesizer: Send + Sync {
    /// Forms of `reading`'s lemma carrying `target_tag`.
    ///
    /// With `is_regex` set, `target_tag` is a regular expression (possibly a
    /// `|`-separated list of tags) and every matching tag is generated.
    fn synthesize(&self, reading: &Reading, target_tag: &str, is_regex: bool) -> anyhow::Result<Vec<String>>;

    /// Map a tag computed by a rule onto the generator's own tag set.
    fn tag_correction(&self, tag: &str) -> String {
        tag.to_string()
    }
}
