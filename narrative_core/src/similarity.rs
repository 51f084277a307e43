//! Lexical similarity used for echo matching and deferred binding.
//!
//! Content matching is purely lexical: lower-cased, whitespace-tokenized word
//! sets. Punctuation stays attached to its word in the Jaccard index, while
//! keywords match words with their punctuation trimmed.

use std::collections::HashSet;

/// Lower-cased whitespace tokens of `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard index of the two texts' token sets. Two empty texts score 0.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let left = tokenize(a);
    let right = tokenize(b);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Lower-cased whitespace tokens of `text` with surrounding punctuation
/// removed, in order.
fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Fraction of `keywords` that occur as whole words (case-insensitively) in
/// `text`.
///
/// A multi-word keyword must appear as a contiguous run of words. Returns 0
/// for an empty keyword list.
pub fn keyword_match_ratio(keywords: &[String], text: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let haystack = words(text);
    let hits = keywords
        .iter()
        .filter(|k| {
            let needle = words(k);
            !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle.as_slice())
        })
        .count();
    hits as f64 / keywords.len() as f64
}
