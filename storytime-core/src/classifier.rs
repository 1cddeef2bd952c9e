//! Phrase-list classifiers for participant answers.
//!
//! Three fixed lists drive the conversation: confusion markers (is the
//! participant asking for help instead of answering?), negative feedback
//! (did they dislike the story?) and approval (did they like the revision?).
//! The lists are plain data in a [`MarkerTable`] so they can be tuned or
//! loaded from a file; the engine only sees the [`Classifier`] trait.
//!
//! Matching is deliberately coarse. Substring matching flags any answer that
//! happens to contain a marker, so "somewhere sunny" reads as confused
//! because it contains "where". That is a known limitation of the heuristic.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// What a piece of participant text was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// A request for clarification rather than an answer.
    Confused,
    /// A negative reaction to the story.
    Negative,
    /// A positive reaction to the revised story.
    Approval,
    /// None of the markers matched.
    Answer,
}

/// Anything that can put participant text into a [`Category`].
pub trait Classifier: Send + Sync {
    /// Classify a piece of participant text.
    fn classify(&self, text: &str) -> Category;
}

/// How a [`PhraseClassifier`] compares input against its markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The marker appears anywhere in the input.
    Substring,
    /// The whole input equals the marker.
    Exact,
}

/// A classifier backed by a fixed list of marker phrases.
///
/// Input is trimmed and compared case-insensitively. A match yields the
/// classifier's category; anything else is [`Category::Answer`].
#[derive(Debug, Clone)]
pub struct PhraseClassifier {
    markers: Vec<String>,
    category: Category,
    mode: MatchMode,
}

impl PhraseClassifier {
    /// Create a classifier over the given markers.
    pub fn new(markers: &[String], category: Category, mode: MatchMode) -> Self {
        Self {
            markers: markers.iter().map(|m| m.trim().to_lowercase()).collect(),
            category,
            mode,
        }
    }

    /// Classifier for the confusion markers in `table`.
    pub fn confusion(table: &MarkerTable) -> Self {
        Self::new(&table.confusion, Category::Confused, MatchMode::Substring)
    }

    /// Classifier for the negative feedback answers in `table`.
    pub fn negative_feedback(table: &MarkerTable) -> Self {
        Self::new(&table.negative, Category::Negative, MatchMode::Exact)
    }

    /// Classifier for the approval words in `table`.
    pub fn approval(table: &MarkerTable) -> Self {
        Self::new(&table.approval, Category::Approval, MatchMode::Substring)
    }

    /// Return the first marker matching `text`, if any.
    pub fn matching_marker(&self, text: &str) -> Option<&str> {
        let input = text.trim().to_lowercase();
        self.markers
            .iter()
            .find(|marker| match self.mode {
                MatchMode::Substring => input.contains(marker.as_str()),
                MatchMode::Exact => input == **marker,
            })
            .map(String::as_str)
    }
}

impl Classifier for PhraseClassifier {
    fn classify(&self, text: &str) -> Category {
        match self.matching_marker(text) {
            Some(marker) => {
                tracing::debug!(marker, category = ?self.category, "marker matched");
                self.category
            }
            None => Category::Answer,
        }
    }
}

/// The phrase lists used by the default classifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerTable {
    /// Phrases that signal the participant wants the question explained.
    pub confusion: Vec<String>,
    /// Whole answers that mean the participant disliked the story.
    pub negative: Vec<String>,
    /// Words that mean the participant liked the revised story.
    pub approval: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for MarkerTable {
    fn default() -> Self {
        Self {
            confusion: strings(&[
                "what",
                "what?",
                "huh",
                "huh?",
                "don't know",
                "idk",
                "what does that mean",
                "i don't understand",
                "don't get it",
                "what do you mean",
                "confused",
                "not sure",
                "mean",
                "explain",
                "how",
                "why",
                "where",
                "when",
                "can you explain",
                "tell me more",
                "what is",
            ]),
            // Case variants are redundant under case-insensitive matching.
            negative: strings(&[
                "no",
                "nope",
                "not really",
                "didn't like it",
                "bad",
                "n",
                "N",
                "No",
                "NO",
            ]),
            approval: strings(&[
                "yes",
                "yeah",
                "better",
                "good",
                "ya",
                "yas",
                "yea",
                "yep",
                "definitely",
                "ye",
                "Y",
                "y",
            ]),
        }
    }
}

impl MarkerTable {
    /// Load a marker table from a JSON file.
    ///
    /// Lists missing from the file keep their default contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::MarkersReadError {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| Error::MarkersParseError {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confusion() -> PhraseClassifier {
        PhraseClassifier::confusion(&MarkerTable::default())
    }

    #[test]
    fn test_every_confusion_marker_is_detected() {
        let classifier = confusion();
        for marker in MarkerTable::default().confusion {
            assert_eq!(
                classifier.classify(&marker),
                Category::Confused,
                "marker {:?} should be confusion",
                marker
            );
            let embedded = format!("  um, {} ok  ", marker.to_uppercase());
            assert_eq!(
                classifier.classify(&embedded),
                Category::Confused,
                "embedded {:?} should be confusion",
                embedded
            );
        }
    }

    #[test]
    fn test_plain_answers_are_not_confusion() {
        let classifier = confusion();
        for answer in [
            "princess",
            "a castle",
            "fly",
            "meet a dragon",
            "make everyone happy",
            "a friendly dragon who bakes cookies",
            "",
        ] {
            assert_eq!(
                classifier.classify(answer),
                Category::Answer,
                "{:?} should be an answer",
                answer
            );
        }
    }

    #[test]
    fn test_substring_false_positives_are_known() {
        let classifier = confusion();
        // "somewhere" contains "where", "show" contains "how".
        assert_eq!(classifier.classify("somewhere sunny"), Category::Confused);
        assert_eq!(classifier.classify("a magic show"), Category::Confused);
        assert_eq!(classifier.matching_marker("a magic show"), Some("how"));
    }

    #[test]
    fn test_negative_feedback_is_exact_and_case_insensitive() {
        let classifier = PhraseClassifier::negative_feedback(&MarkerTable::default());
        for answer in ["no", "No", "NO", " nope ", "Not Really", "bad", "n", "N"] {
            assert_eq!(classifier.classify(answer), Category::Negative, "{:?}", answer);
        }
        for answer in ["no way it was great", "not bad", "yes", "", "loved it"] {
            assert_eq!(classifier.classify(answer), Category::Answer, "{:?}", answer);
        }
    }

    #[test]
    fn test_approval_uses_substring_match() {
        let classifier = PhraseClassifier::approval(&MarkerTable::default());
        assert_eq!(classifier.classify("yes"), Category::Approval);
        assert_eq!(classifier.classify("it was BETTER"), Category::Approval);
        assert_eq!(classifier.classify("no"), Category::Answer);
        assert_eq!(classifier.classify("not at all"), Category::Answer);
    }

    #[test]
    fn test_custom_markers() {
        let classifier = PhraseClassifier::new(
            &strings(&["Pardon"]),
            Category::Confused,
            MatchMode::Substring,
        );
        assert_eq!(classifier.classify("pardon me?"), Category::Confused);
        assert_eq!(classifier.classify("what"), Category::Answer);
    }

    #[test]
    fn test_load_partial_table_keeps_defaults() {
        let path = std::env::temp_dir().join(format!(
            "storytime_markers_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "negative": ["meh"] }"#).unwrap();

        let table = MarkerTable::load(&path).unwrap();
        assert_eq!(table.negative, vec!["meh"]);
        assert_eq!(table.confusion, MarkerTable::default().confusion);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_errors() {
        let missing = std::env::temp_dir().join("storytime_markers_missing_12345.json");
        assert!(matches!(
            MarkerTable::load(&missing),
            Err(Error::MarkersReadError { .. })
        ));

        let path = std::env::temp_dir().join(format!(
            "storytime_markers_bad_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            MarkerTable::load(&path),
            Err(Error::MarkersParseError { .. })
        ));
        std::fs::remove_file(&path).ok();
    }
}
