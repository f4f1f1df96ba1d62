// src/relevance/semantic.rs
//! Embedding-similarity relevance filter trained incrementally from pipeline outcomes.
//!
//! Score is a margin, not a ratio: `clamp(0.5 + (pos_sim - neg_sim) / 2, 0, 1)` with
//! `pos_sim`/`neg_sim` the best cosine against each label. It depends only on the
//! nearest neighbours, never on how many examples each label holds.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::embedding::{Embedder, EmbeddingError};
use super::training::{
    Label, TrainingExample, TrainingRepository, TrainingSet, DEFAULT_MAX_EXAMPLES_PER_LABEL,
};
use crate::analyze::anon_hash;
use crate::error::PipelineError;

pub const DEFAULT_THRESHOLD: f32 = 0.65;
pub const DEFAULT_MIN_POSITIVE_EXAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemanticParams {
    pub threshold: f32,
    /// Below this many positives the filter passes everything.
    pub min_positive_examples: usize,
    pub max_examples_per_label: usize,
}

impl Default for SemanticParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_positive_examples: DEFAULT_MIN_POSITIVE_EXAMPLES,
            max_examples_per_label: DEFAULT_MAX_EXAMPLES_PER_LABEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelevancePrediction {
    pub is_relevant: bool,
    pub score: f32,
    pub explanation: String,
}

impl RelevancePrediction {
    pub(crate) fn pass_through(explanation: impl Into<String>) -> Self {
        Self {
            is_relevant: true,
            score: 0.5,
            explanation: explanation.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TrainingStats {
    pub positive_count: usize,
    pub negative_count: usize,
    pub backend_available: bool,
}

/// Margin score from the best positive and negative similarities.
pub fn margin_score(pos_sim: f32, neg_sim: f32) -> f32 {
    (0.5 + (pos_sim - neg_sim) / 2.0).clamp(0.0, 1.0)
}

pub struct SemanticFilter {
    embedder: Option<Arc<dyn Embedder>>,
    repo: Box<dyn TrainingRepository>,
    params: SemanticParams,
    /// Loaded from `repo` on first use, then mutated in place.
    set: Option<TrainingSet>,
    /// The stored set could not be read; nothing is saved over it until a load succeeds.
    load_failed: bool,
}

impl SemanticFilter {
    pub fn new(
        embedder: Option<Arc<dyn Embedder>>,
        repo: Box<dyn TrainingRepository>,
        params: SemanticParams,
    ) -> Self {
        Self {
            embedder,
            repo,
            params,
            set: None,
            load_failed: false,
        }
    }

    pub fn params(&self) -> &SemanticParams {
        &self.params
    }

    pub fn backend_available(&self) -> bool {
        self.embedder.is_some()
    }

    fn training(&mut self) -> &mut TrainingSet {
        if self.set.is_none() {
            let loaded = match self.repo.load() {
                Ok(set) => {
                    info!(
                        target: "relevance",
                        positives = set.positives().len(),
                        negatives = set.negatives().len(),
                        "semantic training set loaded"
                    );
                    set
                }
                Err(e) => {
                    warn!(target: "relevance", error = ?e, "training set unreadable, learning in memory only");
                    self.load_failed = true;
                    TrainingSet::default()
                }
            };
            self.set = Some(loaded);
        }
        self.set.get_or_insert_with(TrainingSet::default)
    }

    pub fn stats(&mut self) -> TrainingStats {
        let backend_available = self.backend_available();
        let set = self.training();
        TrainingStats {
            positive_count: set.positives().len(),
            negative_count: set.negatives().len(),
            backend_available,
        }
    }

    /// True once any example exists and a backend is present.
    pub fn has_training_data(&mut self) -> bool {
        self.backend_available() && !self.training().is_empty()
    }

    pub async fn add_positive(&mut self, text: &str) -> Result<(), PipelineError> {
        self.add_example(text, Label::Positive, None).await
    }

    /// The reason is embedded together with the text so rejections carry their cause.
    pub async fn add_negative(&mut self, text: &str, reason: &str) -> Result<(), PipelineError> {
        self.add_example(text, Label::Negative, Some(reason)).await
    }

    async fn add_example(
        &mut self,
        text: &str,
        label: Label,
        reason: Option<&str>,
    ) -> Result<(), PipelineError> {
        let Some(embedder) = self.embedder.clone() else {
            return Err(PipelineError::EmbeddingBackendUnavailable(
                "no embedder configured".into(),
            ));
        };

        let to_embed = match reason {
            Some(r) => format!("{text}\n\nRejection reason: {r}"),
            None => text.to_string(),
        };
        let embedding = embedder
            .embed(&to_embed)
            .await
            .map_err(|e| PipelineError::EmbeddingBackendUnavailable(e.to_string()))?;

        let cap = self.params.max_examples_per_label;
        let example = TrainingExample {
            text: text.to_string(),
            label,
            rejection_reason: reason.map(str::to_string),
            embedding,
        };
        self.training().push(example, cap);
        self.persist();
        debug!(target: "relevance", id = %anon_hash(text), ?label, "training example added");
        Ok(())
    }

    /// Save the in-memory set. After a failed load the stored set is re-read first and
    /// examples learned meanwhile are appended to it; if it is still unreadable the save
    /// is skipped so the file is never replaced by a partial set.
    fn persist(&mut self) {
        if self.load_failed {
            match self.repo.load() {
                Ok(mut stored) => {
                    let cap = self.params.max_examples_per_label;
                    let learned = self.set.take().unwrap_or_default();
                    for ex in learned.positives().iter().chain(learned.negatives()) {
                        stored.push(ex.clone(), cap);
                    }
                    info!(
                        target: "relevance",
                        positives = stored.positives().len(),
                        negatives = stored.negatives().len(),
                        "training set readable again; merged in-memory examples"
                    );
                    self.set = Some(stored);
                    self.load_failed = false;
                }
                Err(e) => {
                    warn!(target: "relevance", error = ?e, "training set still unreadable; not saving");
                    return;
                }
            }
        }
        if let Some(set) = self.set.as_ref() {
            if let Err(e) = self.repo.save(set) {
                warn!(target: "relevance", error = ?e, "failed to persist training set");
            }
        }
    }

    /// Score `text`. Fails open (relevant, 0.5) without a backend, while under-trained,
    /// or when embedding the query fails.
    pub async fn predict_relevance(&mut self, text: &str, threshold: f32) -> RelevancePrediction {
        let Some(embedder) = self.embedder.clone() else {
            return RelevancePrediction::pass_through("embedding backend unavailable");
        };

        let min_pos = self.params.min_positive_examples;
        let positives = self.training().positives().len();
        if positives < min_pos {
            return RelevancePrediction::pass_through(format!(
                "under-trained: {positives}/{min_pos} positive examples"
            ));
        }

        let query = match embedder.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                log_embed_failure(&e);
                return RelevancePrediction::pass_through("embedding failed, passing");
            }
        };

        let set = self.training();
        let pos_sim = set
            .positive_matrix()
            .nearest(&query)
            .map(|(_, s)| s)
            .unwrap_or(0.0);
        let (neg_sim, neg_reason) = match set.negative_matrix().nearest(&query) {
            Some((idx, s)) => (
                s,
                set.negatives()
                    .get(idx)
                    .and_then(|e| e.rejection_reason.clone())
                    .unwrap_or_default(),
            ),
            None => (0.0, String::new()),
        };

        let score = margin_score(pos_sim, neg_sim);
        let is_relevant = score >= threshold;
        let explanation = if is_relevant {
            format!("closer to accepted examples (score {score:.2})")
        } else {
            let short: String = neg_reason.chars().take(50).collect();
            format!("close to rejection '{short}' (score {score:.2})")
        };

        debug!(
            target: "relevance",
            id = %anon_hash(text),
            pos_sim, neg_sim, score, threshold, is_relevant,
            "semantic prediction"
        );

        RelevancePrediction {
            is_relevant,
            score,
            explanation,
        }
    }

    /// Boolean gate: empty content is rejected outright.
    pub async fn semantic_pre_filter(&mut self, content: &str, threshold: f32) -> bool {
        if content.trim().is_empty() {
            return false;
        }
        let p = self.predict_relevance(content, threshold).await;
        if !p.is_relevant {
            info!(target: "relevance", id = %anon_hash(content), explanation = %p.explanation, "semantic filter rejected");
        }
        p.is_relevant
    }

    /// Score a batch; when fewer than `min_pass` items clear `threshold`, force-pass the
    /// best-scoring rejected items until `min_pass` is met (or items run out).
    pub async fn predict_batch(
        &mut self,
        items: &[&str],
        threshold: f32,
        min_pass: usize,
    ) -> Vec<RelevancePrediction> {
        let mut out = Vec::with_capacity(items.len());
        for text in items {
            out.push(self.predict_relevance(text, threshold).await);
        }
        force_minimum_passes(&mut out, min_pass);
        out
    }
}

fn log_embed_failure(e: &EmbeddingError) {
    warn!(target: "relevance", error = %e, "query embedding failed; failing open");
}

/// Flip the highest-scoring non-passing predictions to pass until `min_pass` pass.
/// Returns how many were flipped.
pub(crate) fn force_minimum_passes(preds: &mut [RelevancePrediction], min_pass: usize) -> usize {
    let passing = preds.iter().filter(|p| p.is_relevant).count();
    if passing >= min_pass {
        return 0;
    }
    let mut rejected: Vec<usize> = (0..preds.len()).filter(|&i| !preds[i].is_relevant).collect();
    // stable: equal scores keep input order
    rejected.sort_by(|&a, &b| preds[b].score.total_cmp(&preds[a].score));

    let mut flipped = 0;
    for idx in rejected.into_iter().take(min_pass - passing) {
        let p = &mut preds[idx];
        p.is_relevant = true;
        p.explanation = format!("forced pass to meet batch minimum (score {:.2})", p.score);
        flipped += 1;
    }
    flipped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(score: f32, is_relevant: bool) -> RelevancePrediction {
        RelevancePrediction {
            is_relevant,
            score,
            explanation: String::new(),
        }
    }

    #[test]
    fn margin_depends_only_on_difference() {
        assert!((margin_score(0.9, 0.1) - 0.9).abs() < 1e-6);
        assert!((margin_score(0.6, 0.6) - 0.5).abs() < 1e-6);
        assert!((margin_score(0.7, 0.5) - margin_score(0.4, 0.2)).abs() < 1e-6);
        assert_eq!(margin_score(1.0, -1.0), 1.0);
        assert_eq!(margin_score(-1.0, 1.0), 0.0);
    }

    #[test]
    fn forced_passes_pick_top_scores() {
        let mut preds = vec![pred(0.2, false), pred(0.6, false), pred(0.9, true), pred(0.4, false)];
        assert_eq!(force_minimum_passes(&mut preds, 3), 2);
        let passed: Vec<bool> = preds.iter().map(|p| p.is_relevant).collect();
        assert_eq!(passed, vec![false, true, true, true]);
    }

    #[test]
    fn forced_passes_noop_when_minimum_met() {
        let mut preds = vec![pred(0.2, false), pred(0.9, true)];
        assert_eq!(force_minimum_passes(&mut preds, 1), 0);
        assert!(!preds[0].is_relevant);
        force_minimum_passes(&mut preds, 10);
        assert!(preds.iter().all(|p| p.is_relevant));
    }
}
