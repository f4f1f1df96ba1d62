// src/classify/mod.rs
//! External classification oracle: request shape, the oracle seam, and bounded retry.

pub mod criteria;
pub mod openai;
pub mod verdict;

pub use criteria::{criteria_from_examples, LearnedCriteria};
pub use openai::OpenAiClassifier;
pub use verdict::{parse_verdict, OpportunityDetails, Verdict};

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::error::PipelineError;
use crate::ingest::SourceType;

/// What the oracle sees for one item.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub text: String,
    pub source_type: SourceType,
    /// Pre-rendered learned criteria block; may be empty.
    pub learned_criteria: String,
    /// Extra extraction hints; may be empty.
    pub guidance: String,
}

/// Text in, validated verdict out. Implementations map transport failures onto
/// `RateLimited` / `ClassificationFailure` and bad payloads onto `MalformedVerdict`.
#[async_trait]
pub trait ClassifierOracle: Send + Sync {
    async fn classify(
        &self,
        model: &str,
        req: &ClassificationRequest,
    ) -> Result<Verdict, PipelineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2000,
        }
    }
}

impl RetryPolicy {
    pub fn sanitized(mut self) -> Self {
        self.max_attempts = self.max_attempts.clamp(1, 10);
        self.initial_backoff_ms = self.initial_backoff_ms.min(60_000);
        self
    }
}

/// Call the oracle, retrying only on `RateLimited` with doubling backoff.
/// Any other error is returned immediately. Returns the last error once attempts run out.
pub async fn classify_with_retry(
    oracle: &dyn ClassifierOracle,
    model: &str,
    req: &ClassificationRequest,
    policy: RetryPolicy,
) -> Result<Verdict, PipelineError> {
    let attempts = policy.max_attempts.max(1);
    let mut delay = Duration::from_millis(policy.initial_backoff_ms);
    let mut attempt = 1;
    loop {
        match oracle.classify(model, req).await {
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(
                    target: "classify",
                    model, attempt, max = attempts, backoff_ms = delay.as_millis() as u64,
                    "rate limited; backing off"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}

const ROLE: &str = "You are a business-development analyst looking for concrete, \
actionable opportunities for a corporate innovation and venture-building consultancy.";

const RULES: &str = "CLASSIFICATION CRITERIA:\n\
1. CONCRETE ACTION: a specific move (investment, M&A, launch, expansion) by a large company.\n\
2. FIT: it must match our offerings (corporate venturing, new digital businesses, data strategy).";

const ANSWER_FORMAT: &str = r#"Reply ONLY with a JSON object.
If it is NOT an opportunity:
{"is_opportunity": false, "reason": "short explanation"}
If it IS an opportunity, all fields are required:
{"is_opportunity": true, "company_name": "...", "opportunity_summary": "...", "fit_rationale": "...", "proposed_solution": "...", "value_proposition": "..."}"#;

/// Single prompt for classification plus extraction.
pub fn build_prompt(req: &ClassificationRequest) -> String {
    let mut out = String::with_capacity(req.text.len() + 1024);
    out.push_str(ROLE);
    out.push_str("\n\n");
    out.push_str(RULES);
    out.push_str("\n\n");
    for block in [&req.learned_criteria, &req.guidance] {
        if !block.trim().is_empty() {
            out.push_str(block.trim());
            out.push_str("\n\n");
        }
    }
    out.push_str(&format!(
        "Text to analyze ({}):\n\"{}\"\n\n",
        req.source_type.label(),
        req.text
    ));
    out.push_str(ANSWER_FORMAT);
    out
}
