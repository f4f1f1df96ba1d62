//! Story-level deduplication against recently notified opportunities.
//!
//! Two outlets rarely publish the same headline verbatim, so URL checks alone let the
//! same story through twice. This gate layers fuzzy text similarity and entity overlap
//! and runs before the paid classification call.
//!
//! Rules, evaluated per candidate in input order; the first rule that fires wins:
//! 1. text similarity >= `high_text_similarity`            → `high_text_similarity`
//! 2. company match and text similarity >= `same_company_text` → `same_company_similar_content`
//! 3. company match and entity overlap >= `same_company_entities` → `same_company_shared_entities`
//! 4. entity overlap >= `high_entity_overlap`              → `high_entity_overlap`

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyze::{entity_overlap, extract_with_company, normalize_opt, text_similarity};

/// A previously notified opportunity inside the dedup window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentOpportunity {
    pub headline: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub source_url: String,
    /// `None` means "unknown"; such records are always kept in the window.
    #[serde(default)]
    pub notified_at: Option<DateTime<Utc>>,
}

/// Empirical cut-offs tuned on a Spanish/English news corpus. Configurable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupThresholds {
    pub high_text_similarity: f32,
    pub same_company_text: f32,
    pub same_company_entities: f32,
    pub high_entity_overlap: f32,
}

impl Default for DedupThresholds {
    fn default() -> Self {
        Self {
            high_text_similarity: 0.75,
            same_company_text: 0.45,
            same_company_entities: 0.5,
            high_entity_overlap: 0.70,
        }
    }
}

impl DedupThresholds {
    /// Clamp every threshold into `[0, 1]`; non-finite values fall back to defaults.
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let fix = |v: f32, fallback: f32| {
            if v.is_finite() {
                v.clamp(0.0, 1.0)
            } else {
                fallback
            }
        };
        Self {
            high_text_similarity: fix(self.high_text_similarity, d.high_text_similarity),
            same_company_text: fix(self.same_company_text, d.same_company_text),
            same_company_entities: fix(self.same_company_entities, d.same_company_entities),
            high_entity_overlap: fix(self.high_entity_overlap, d.high_entity_overlap),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    HighTextSimilarity,
    SameCompanySimilarContent,
    SameCompanySharedEntities,
    HighEntityOverlap,
}

impl DuplicateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateReason::HighTextSimilarity => "high_text_similarity",
            DuplicateReason::SameCompanySimilarContent => "same_company_similar_content",
            DuplicateReason::SameCompanySharedEntities => "same_company_shared_entities",
            DuplicateReason::HighEntityOverlap => "high_entity_overlap",
        }
    }
}

impl std::fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which earlier opportunity matched, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub headline: String,
    pub company: Option<String>,
    pub source_url: String,
    /// Text similarity for the text rules, entity overlap for the entity rules.
    pub similarity: f32,
    pub reason: DuplicateReason,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shared_entities: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    thresholds: DedupThresholds,
    lookback_days: i64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DedupThresholds::default(), 7)
    }
}

impl Deduplicator {
    /// `lookback_days` < 1 is treated as 1.
    pub fn new(thresholds: DedupThresholds, lookback_days: i64) -> Self {
        Self {
            thresholds: thresholds.sanitized(),
            lookback_days: lookback_days.max(1),
        }
    }

    pub fn thresholds(&self) -> &DedupThresholds {
        &self.thresholds
    }

    pub fn lookback_days(&self) -> i64 {
        self.lookback_days
    }

    /// Convenience boolean form of [`Deduplicator::find_duplicate`].
    pub fn is_duplicate(
        &self,
        new_headline: &str,
        new_company: Option<&str>,
        recent: &[RecentOpportunity],
        now: DateTime<Utc>,
    ) -> bool {
        self.find_duplicate(new_headline, new_company, recent, now)
            .is_some()
    }

    /// Return the first recent opportunity (in input order) that `new_headline`
    /// restates, or `None`.
    pub fn find_duplicate(
        &self,
        new_headline: &str,
        new_company: Option<&str>,
        recent: &[RecentOpportunity],
        now: DateTime<Utc>,
    ) -> Option<DuplicateMatch> {
        let cutoff = now - ChronoDuration::days(self.lookback_days);
        let new_company_norm = normalize_opt(new_company);
        let new_entities = extract_with_company(new_headline, &new_company_norm);

        let in_window = recent
            .iter()
            .filter(|opp| opp.notified_at.map_or(true, |ts| ts >= cutoff));

        for opp in in_window {
            let opp_company_norm = normalize_opt(opp.company_name.as_deref());
            let opp_entities = extract_with_company(&opp.headline, &opp_company_norm);

            let company_match = companies_match(&new_company_norm, &opp_company_norm);
            let text_sim = text_similarity(new_headline, &opp.headline);
            let overlap = entity_overlap(&new_entities, &opp_entities);

            let hit = |reason: DuplicateReason, similarity: f32, with_entities: bool| {
                let shared_entities = if with_entities {
                    new_entities.intersection(&opp_entities).cloned().collect()
                } else {
                    Vec::new()
                };
                DuplicateMatch {
                    headline: opp.headline.clone(),
                    company: opp.company_name.clone(),
                    source_url: opp.source_url.clone(),
                    similarity,
                    reason,
                    shared_entities,
                }
            };

            let t = &self.thresholds;
            let found = if text_sim >= t.high_text_similarity {
                Some(hit(DuplicateReason::HighTextSimilarity, text_sim, false))
            } else if company_match && text_sim >= t.same_company_text {
                Some(hit(DuplicateReason::SameCompanySimilarContent, text_sim, false))
            } else if company_match && overlap >= t.same_company_entities {
                Some(hit(DuplicateReason::SameCompanySharedEntities, overlap, true))
            } else if overlap >= t.high_entity_overlap {
                Some(hit(DuplicateReason::HighEntityOverlap, overlap, true))
            } else {
                None
            };

            if let Some(m) = found {
                debug!(
                    target: "dedup",
                    reason = %m.reason,
                    similarity = m.similarity,
                    matched_url = %m.source_url,
                    "duplicate story"
                );
                return Some(m);
            }
        }
        None
    }
}

/// Normalized names are equal, or one contains the other ("santander" in "banco santander").
fn companies_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(b) || b.contains(a)
}
