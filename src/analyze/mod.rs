// src/analyze/mod.rs
//! Text analysis primitives shared by the deduplicator and the relevance filter.

pub mod entities;
pub mod normalize;
pub mod similarity;

pub use entities::{extract_entities, extract_with_company, EntitySet};
pub use normalize::{normalize, normalize_opt};
pub use similarity::{entity_overlap, text_similarity};

/// Short, stable, non-reversible id for a text, used in log lines instead of raw content.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;

    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
