//! Description text normalisation and tokenisation.
//!
//! Descriptions are free text typed into invoices; the similarity
//! index only cares about Latin-alphabet words, so everything else is
//! stripped before vectorising.

use std::collections::HashSet;

/// Lowercase, replace every character outside the Latin alphabet and
/// whitespace with a space, then collapse whitespace runs.
pub fn normalize(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphabetic() { c } else { ' ' })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tokenise a normalised description, dropping stop words.
pub fn tokenize<'a>(normalized: &'a str, stop_words: &HashSet<&str>) -> Vec<&'a str> {
    normalized
        .split_whitespace()
        .filter(|token| !stop_words.contains(token))
        .collect()
}

pub fn english_stop_words() -> HashSet<&'static str> {
    ENGLISH_STOP_WORDS.iter().copied().collect()
}

/// Common English function words excluded from the TF-IDF vocabulary.
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
    "between", "both", "but", "by", "can", "cannot", "could", "did", "do", "does",
    "doing", "down", "during", "each", "few", "for", "from", "further", "had",
    "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself",
    "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out",
    "over", "own", "same", "she", "should", "so", "some", "such", "than", "that",
    "the", "their", "theirs", "them", "themselves", "then", "there", "these",
    "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];
