// src/relevance/bootstrap.rs
//! Seed the filters from labeled store records.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use super::bayes::BayesFilter;
use super::semantic::SemanticFilter;
use crate::error::PipelineError;
use crate::store::{RecordStatus, Store, StoredRecord};

pub const DEFAULT_NEGATIVE_REASON: &str = "User marked irrelevant";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub positives_added: usize,
    pub negatives_added: usize,
    pub skipped: usize,
}

/// Semantic label: accepted or confirmed → positive; rejected by oracle or human → negative.
pub fn semantic_label(status: RecordStatus) -> Option<bool> {
    match status {
        RecordStatus::Notified | RecordStatus::Relevant => Some(true),
        RecordStatus::AiRejected | RecordStatus::Irrelevant => Some(false),
        RecordStatus::Pending => None,
    }
}

/// Bayes label: oracle rejections are left out, only human negatives count.
pub fn bayes_label(status: RecordStatus) -> Option<bool> {
    match status {
        RecordStatus::Notified | RecordStatus::Relevant => Some(true),
        RecordStatus::Irrelevant => Some(false),
        RecordStatus::AiRejected | RecordStatus::Pending => None,
    }
}

/// Replay stored outcomes into the semantic training set.
/// Fails with `EmbeddingBackendUnavailable` when no backend is configured.
pub async fn bootstrap_from_store(
    filter: &mut SemanticFilter,
    store: &dyn Store,
) -> Result<BootstrapReport> {
    if !filter.backend_available() {
        return Err(PipelineError::EmbeddingBackendUnavailable("no embedder configured".into()).into());
    }
    let records = store.labeled_records().await?;
    let mut report = BootstrapReport::default();

    for rec in &records {
        let Some(label) = semantic_label(rec.status) else {
            continue;
        };
        let text = rec.training_text();
        if text.is_empty() {
            report.skipped += 1;
            continue;
        }
        let added = if label {
            filter.add_positive(&text).await
        } else {
            let reason = rec
                .rejection_reason
                .as_deref()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or(DEFAULT_NEGATIVE_REASON);
            filter.add_negative(&text, reason).await
        };
        match added {
            Ok(()) if label => report.positives_added += 1,
            Ok(()) => report.negatives_added += 1,
            Err(e) => {
                tracing::warn!(target: "relevance", error = %e, url = %rec.source_url, "bootstrap example skipped");
                report.skipped += 1;
            }
        }
    }

    info!(
        target: "relevance",
        positives = report.positives_added,
        negatives = report.negatives_added,
        skipped = report.skipped,
        "semantic filter bootstrapped"
    );
    Ok(report)
}

/// Train the Naive Bayes fallback from labeled records.
pub fn train_bayes(records: &[StoredRecord]) -> Result<BayesFilter> {
    let texts: Vec<(String, bool)> = records
        .iter()
        .filter_map(|r| bayes_label(r.status).map(|l| (r.training_text(), l)))
        .filter(|(t, _)| !t.is_empty())
        .collect();
    BayesFilter::train(texts.iter().map(|(t, l)| (t.as_str(), *l)))
}
