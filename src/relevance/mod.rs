// src/relevance/mod.rs
//! Zero-cost relevance gate run before any paid classification call.
//!
//! Explicit tiers, never blended:
//! 1. semantic filter (embeddings + margin score) once it has any training data,
//! 2. offline Naive Bayes model otherwise, if one was trained,
//! 3. pass everything.

pub mod bayes;
pub mod bootstrap;
pub mod embedding;
pub mod semantic;
pub mod training;

pub use bayes::BayesFilter;
pub use bootstrap::{bootstrap_from_store, train_bayes, BootstrapReport};
pub use embedding::{cosine_similarity, Embedder, EmbeddingError, OpenAiEmbedder};
use semantic::force_minimum_passes;
pub use semantic::{
    margin_score, RelevancePrediction, SemanticFilter, SemanticParams, TrainingStats,
};
pub use training::{
    JsonTrainingRepository, Label, MemoryTrainingRepository, TrainingExample, TrainingRepository,
    TrainingSet,
};

use tracing::{info, warn};

use crate::analyze::anon_hash;

/// Which tier made a pre-filter decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTier {
    Semantic,
    Bayes,
    PassThrough,
}

pub struct RelevanceFilter {
    semantic: SemanticFilter,
    fallback: Option<BayesFilter>,
}

impl RelevanceFilter {
    pub fn new(semantic: SemanticFilter, fallback: Option<BayesFilter>) -> Self {
        Self { semantic, fallback }
    }

    pub fn semantic(&mut self) -> &mut SemanticFilter {
        &mut self.semantic
    }

    pub fn threshold(&self) -> f32 {
        self.semantic.params().threshold
    }

    pub fn stats(&mut self) -> TrainingStats {
        self.semantic.stats()
    }

    /// Tier that would judge the next item.
    pub fn active_tier(&mut self) -> FilterTier {
        if self.semantic.has_training_data() {
            FilterTier::Semantic
        } else if self.fallback.is_some() {
            FilterTier::Bayes
        } else {
            FilterTier::PassThrough
        }
    }

    /// `true` → worth a classification call. Empty content never passes.
    pub async fn pre_filter(&mut self, content: &str) -> bool {
        let verdicts = self.pre_filter_batch(&[content], 0).await;
        verdicts.first().copied().unwrap_or(false)
    }

    fn bayes_prediction(&self, content: &str, threshold: f32) -> RelevancePrediction {
        let Some(model) = self.fallback.as_ref() else {
            return RelevancePrediction::pass_through("no bayes model");
        };
        let p = model.prob_relevant(content);
        if !p.is_finite() {
            warn!(target: "relevance", "bayes produced a non-finite probability; passing");
            return RelevancePrediction::pass_through("bayes probability not finite");
        }
        RelevancePrediction {
            is_relevant: p >= threshold,
            score: p,
            explanation: format!("bayes probability {p:.2}"),
        }
    }

    /// Gate a whole cycle at once through the active tier, letting at least `min_pass`
    /// non-empty items through. Empty content is never forced.
    pub async fn pre_filter_batch(&mut self, contents: &[&str], min_pass: usize) -> Vec<bool> {
        let scored: Vec<usize> = (0..contents.len())
            .filter(|&i| !contents[i].trim().is_empty())
            .collect();
        let texts: Vec<&str> = scored.iter().map(|&i| contents[i]).collect();
        let threshold = self.threshold();

        let mut preds: Vec<RelevancePrediction> = match self.active_tier() {
            FilterTier::Semantic => self.semantic.predict_batch(&texts, threshold, 0).await,
            FilterTier::Bayes => texts
                .iter()
                .map(|t| self.bayes_prediction(t, threshold))
                .collect(),
            FilterTier::PassThrough => texts
                .iter()
                .map(|_| RelevancePrediction::pass_through("no filter trained"))
                .collect(),
        };
        let forced = force_minimum_passes(&mut preds, min_pass);
        if forced > 0 {
            info!(target: "relevance", forced, min_pass, "batch minimum forced extra passes");
        }

        let mut out = vec![false; contents.len()];
        for (i, p) in scored.into_iter().zip(preds) {
            if !p.is_relevant {
                info!(target: "relevance", id = %anon_hash(contents[i]), explanation = %p.explanation, "pre-filter rejected");
            }
            out[i] = p.is_relevant;
        }
        out
    }

    /// Batch scoring at the configured threshold, guaranteeing `min_pass` passes.
    pub async fn predict_batch(&mut self, items: &[&str], min_pass: usize) -> Vec<RelevancePrediction> {
        let threshold = self.threshold();
        self.semantic.predict_batch(items, threshold, min_pass).await
    }

    /// Positive feedback; a missing backend is logged, not propagated.
    pub async fn learn_relevant(&mut self, text: &str) {
        if let Err(e) = self.semantic.add_positive(text).await {
            warn!(target: "relevance", error = %e, "positive example not recorded");
        }
    }

    pub async fn learn_rejected(&mut self, text: &str, reason: &str) {
        if let Err(e) = self.semantic.add_negative(text, reason).await {
            warn!(target: "relevance", error = %e, "negative example not recorded");
        }
    }
}
