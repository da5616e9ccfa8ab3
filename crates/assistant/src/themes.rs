//! Theme extraction for summary prompts.

use std::collections::HashMap;

/// Picks the recurring themes out of a set of texts.
pub trait ThemeScorer: Send + Sync {
    /// At most `limit` themes, strongest first.
    fn themes(&self, texts: &[&str], limit: usize) -> Vec<String>;
}

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "against", "almost", "along", "already", "although", "always",
    "among", "another", "anything", "around", "away", "because", "been", "before", "being",
    "below", "between", "both", "could", "didn't", "doesn't", "doing", "during", "each",
    "either", "enough", "every", "everything", "feel", "felt", "first", "from", "going",
    "gonna", "great", "have", "having", "itself", "just", "later", "little", "maybe",
    "might", "morning", "myself", "never", "night", "other", "others", "over", "pretty",
    "quite", "rather", "really", "right", "same", "should", "since", "something", "still",
    "such", "than", "that", "their", "them", "then", "there", "these", "they", "thing",
    "things", "think", "this", "those", "though", "through", "today", "together",
    "tomorrow", "tonight", "too", "under", "until", "very", "wanted", "wasn't", "week",
    "well", "were", "what", "when", "where", "whether", "which", "while", "with", "without",
    "would", "yesterday", "your",
];

/// Counts content words longer than four characters, minus stopwords.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordFrequencyScorer;

impl ThemeScorer for WordFrequencyScorer {
    fn themes(&self, texts: &[&str], limit: usize) -> Vec<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in text
                .split(|c: char| !(c.is_alphanumeric() || c == '\''))
                .map(|w| w.trim_matches('\'').to_lowercase())
            {
                if word.chars().count() > 4 && !STOPWORDS.contains(&word.as_str()) {
                    *counts.entry(word).or_default() += 1;
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.into_iter().take(limit).map(|(word, _)| word).collect()
    }
}
