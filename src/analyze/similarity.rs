// src/analyze/similarity.rs
//! Text and entity similarity scores in `[0, 1]`.
//!
//! `text_similarity` is the Ratcliff/Obershelp "gestalt" ratio over normalized text:
//! find the longest common block, recurse on both sides, and score `2*M / (|a|+|b|)`
//! where `M` is the total number of matched chars.

use std::collections::BTreeSet;

use super::normalize::normalize;

/// Symmetric similarity of two raw texts after normalization. 0.0 if either side is
/// empty (before or after normalization).
pub fn text_similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let na: Vec<char> = normalize(a).chars().collect();
    let nb: Vec<char> = normalize(b).chars().collect();
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    if na == nb {
        return 1.0;
    }

    // Block selection breaks ties by position, which depends on argument order.
    // Score both orders so the result is symmetric.
    let forward = matching_chars(&na, &nb);
    let backward = matching_chars(&nb, &na);
    let matched = forward.max(backward);

    (2.0 * matched as f32) / (na.len() + nb.len()) as f32
}

/// `|A ∩ B| / max(|A|, |B|)`, 0.0 if either set is empty.
pub fn entity_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f32 / a.len().max(b.len()) as f32
}

/// Total chars covered by recursively chosen longest common blocks.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0usize;
    // (a_lo, a_hi, b_lo, b_hi), half-open ranges still to be matched
    let mut pending = vec![(0usize, a.len(), 0usize, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_block(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        total += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    total
}

/// Longest common contiguous block of `a[alo..ahi]` and `b[blo..bhi]`.
/// Returns `(i, j, size)`; ties resolve to the smallest `i`, then the smallest `j`.
fn longest_block(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0usize);
    if width == 0 || ahi <= alo {
        return best;
    }

    // prev[k] = length of the common suffix ending at a[i-1], b[blo+k]
    let mut prev = vec![0usize; width];
    let mut cur = vec![0usize; width];

    for i in alo..ahi {
        for k in 0..width {
            let j = blo + k;
            cur[k] = if a[i] == b[j] {
                if k > 0 { prev[k - 1] + 1 } else { 1 }
            } else {
                0
            };
            let len = cur[k];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_text_scores_one() {
        let s = "Banco Santander adquiere fintech mexicana";
        assert!((text_similarity(s, s) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_side_scores_zero() {
        assert_eq!(text_similarity("", "anything"), 0.0);
        assert_eq!(text_similarity("anything", ""), 0.0);
        // normalizes to empty
        assert_eq!(text_similarity("a an 12", "Bank merger"), 0.0);
    }

    #[test]
    fn symmetric_on_reordered_content() {
        let pairs = [
            ("Santander adquiere Kueski", "Kueski adquirida por Santander"),
            ("Tesla lanza nuevo modelo", "Amazon expande cloud computing"),
            ("abcab xyz", "xyz abcab abc"),
        ];
        for (a, b) in pairs {
            assert_eq!(text_similarity(a, b), text_similarity(b, a), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn matches_gestalt_ratio_on_known_strings() {
        // normalize("abcd xbcd") = "abcd xbcd" and normalize("abcd ybcd") = "abcd ybcd":
        // 8 of 9 chars match on each side.
        let r = text_similarity("abcd xbcd", "abcd ybcd");
        assert!((r - 16.0 / 18.0).abs() < 1e-6, "got {r}");
    }

    #[test]
    fn unrelated_headlines_score_low() {
        let r = text_similarity(
            "Tesla lanza nuevo modelo de vehículo eléctrico en España",
            "Amazon expande su negocio de cloud computing en Colombia",
        );
        assert!(r < 0.45, "got {r}");
    }

    #[test]
    fn overlap_uses_larger_set_as_denominator() {
        let a = set(&["santander", "kueski", "acquisition"]);
        let b = set(&["santander", "kueski"]);
        assert!((entity_overlap(&a, &b) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(entity_overlap(&a, &BTreeSet::new()), 0.0);
    }
}
