//! Tokenization for the inverted index.

use ahash::AHashMap;

/// Split `text` into lowercase terms.
///
/// Terms are maximal runs of alphanumeric characters; everything else is a
/// separator. Empty tokens are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Count term occurrences in `text`.
pub fn term_frequencies(text: &str) -> AHashMap<String, u64> {
    let mut counts = AHashMap::new();
    for term in tokenize(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}
