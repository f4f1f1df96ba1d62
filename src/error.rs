//! Error taxonomy for the per-item pipeline.
//!
//! Only `BudgetExhausted` stops a run, and it does so as cost control. Every other
//! variant is handled locally by the orchestrator (retry, requeue, treat as rejection,
//! ignore, or degrade to pass-through).

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// Provider signalled a rate limit (HTTP 429). Retried with exponential backoff.
    #[error("classification provider rate limited")]
    RateLimited,

    /// Any other call failure. The item is requeued as pending and the budget slot refunded.
    #[error("classification call failed: {0}")]
    ClassificationFailure(String),

    /// Response did not parse as a verdict or missed required fields.
    #[error("malformed verdict: {0}")]
    MalformedVerdict(String),

    /// Duplicate URL insert; the item is already known.
    #[error("record already exists for {0}")]
    StoreConflict(String),

    /// No embedding backend; the relevance filter passes everything.
    #[error("embedding backend unavailable: {0}")]
    EmbeddingBackendUnavailable(String),

    /// Every provider tier is used up for this run.
    #[error("classification call budget exhausted")]
    BudgetExhausted,
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::RateLimited)
    }
}
