// src/analyze/entities.rs
//! Heuristic entity extraction: capitalized word runs (company-ish names) plus a
//! fixed bilingual vocabulary of business-action keywords.
//!
//! Recall-biased on purpose. Sentence-initial words and headline title-case will
//! produce false positives; the deduplicator only uses these sets for overlap ratios.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// 1..=4 consecutive capitalized words (Latin + Spanish accented capitals).
static RE_CAPITALIZED_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-ZÁÉÍÓÚÑ][a-záéíóúñ]+(?:\s+[A-ZÁÉÍÓÚÑ][a-záéíóúñ]+){0,3})\b")
        .expect("capitalized run regex")
});

/// Action keywords matched as lowercase substrings.
pub const ACTION_KEYWORDS: &[&str] = &[
    "adquisición",
    "fusión",
    "inversión",
    "expansión",
    "lanzamiento",
    "transformación",
    "acquisition",
    "merger",
    "investment",
    "expansion",
    "launch",
    "venture",
    "partnership",
    "digital",
];

/// Capitalized runs shorter than this (in chars, spaces included) are ignored.
const MIN_NAME_CHARS: usize = 5;

pub type EntitySet = BTreeSet<String>;

/// Extract the lowercase entity set of `text`.
pub fn extract_entities(text: &str) -> EntitySet {
    let mut out = EntitySet::new();

    for caps in RE_CAPITALIZED_RUN.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            let name = m.as_str();
            if name.chars().count() >= MIN_NAME_CHARS {
                out.insert(name.to_lowercase());
            }
        }
    }

    let lowered = text.to_lowercase();
    for kw in ACTION_KEYWORDS {
        if lowered.contains(kw) {
            out.insert((*kw).to_string());
        }
    }

    out
}

/// Entity set of `text` enriched with a company name as pseudo-entities: the
/// normalized name itself and, when it is longer than 3 chars, its first token
/// ("santander" out of "banco santander").
pub fn extract_with_company(text: &str, normalized_company: &str) -> EntitySet {
    let mut set = extract_entities(text);
    if !normalized_company.is_empty() {
        set.insert(normalized_company.to_string());
        if let Some(first) = normalized_company.split_whitespace().next() {
            if first.chars().count() > 3 {
                set.insert(first.to_string());
            }
        }
    }
    set
}
