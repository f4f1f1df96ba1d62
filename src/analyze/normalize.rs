// src/analyze/normalize.rs
//! Comparison-oriented text canonicalization.
//!
//! The output is only meant for similarity scoring, never for display: URLs,
//! punctuation, bare numbers, very short words and a small bilingual (ES/EN)
//! stop-word list are dropped, everything is lowercased and whitespace collapsed.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("url regex"));
static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("non-word regex"));
static RE_BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\b").expect("number regex"));

/// Words dropped after tokenization. Everything of length <= 2 is dropped anyway.
pub const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "has", // en
    "una", "para", "con", "por", "los", "las", "del", "que", "como", "sus", // es
];

/// Minimum token length (in chars) that survives normalization.
const MIN_TOKEN_CHARS: usize = 3;

/// Canonicalize `text` for comparison. Empty input yields an empty string.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lowered = text.to_lowercase();
    let no_urls = RE_URL.replace_all(&lowered, " ");
    let words_only = RE_NON_WORD.replace_all(&no_urls, " ");
    let no_numbers = RE_BARE_NUMBER.replace_all(&words_only, " ");

    no_numbers
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|w| !STOP_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convenience for optional inputs (missing company name, missing headline).
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}
