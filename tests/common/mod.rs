// tests/common/mod.rs
//
// Stub implementations of every trait seam, shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lead_hunter::budget::{CallBudget, ProviderTier};
use lead_hunter::classify::{
    ClassificationRequest, ClassifierOracle, OpportunityDetails, RetryPolicy, Verdict,
};
use lead_hunter::dedup::{Deduplicator, RecentOpportunity};
use lead_hunter::error::PipelineError;
use lead_hunter::ingest::{CandidateItem, SourceType};
use lead_hunter::notify::{Notifier, OpportunityPayload};
use lead_hunter::pipeline::{CycleSettings, Orchestrator};
use lead_hunter::relevance::{
    Embedder, EmbeddingError, MemoryTrainingRepository, RelevanceFilter, SemanticFilter,
    SemanticParams,
};
use lead_hunter::store::{MemoryStore, RecordStatus, Store, StoreError, StoredRecord};

pub const DIM: usize = 64;

/// Deterministic bag-of-words embedding: each lowercase token bumps one hashed bucket.
pub struct HashEmbedder;

fn bucket(token: &str) -> usize {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in token.bytes() {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x100000001b3);
    }
    (h % DIM as u64) as usize
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash-bow"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut v = vec![0.0f32; DIM];
        for tok in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 2)
        {
            v[bucket(tok)] += 1.0;
        }
        Ok(v)
    }
}

/// Always fails, as an unreachable backend would.
pub struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    fn name(&self) -> &str {
        "down"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::NotAvailable)
    }
}

pub fn semantic(embedder: Option<Arc<dyn Embedder>>) -> SemanticFilter {
    SemanticFilter::new(
        embedder,
        Box::new(MemoryTrainingRepository::new()),
        SemanticParams::default(),
    )
}

/// Oracle answering from a script (front first), falling back to a fixed reply.
/// Records every (model, text) it was called with, and the criteria block it saw.
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Result<Verdict, PipelineError>>>,
    fallback: Result<Verdict, PipelineError>,
    pub calls: Mutex<Vec<(String, String)>>,
    pub criteria_seen: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn always(reply: Result<Verdict, PipelineError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: reply,
            calls: Mutex::new(Vec::new()),
            criteria_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(
        replies: Vec<Result<Verdict, PipelineError>>,
        fallback: Result<Verdict, PipelineError>,
    ) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
            criteria_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn models(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }
}

#[async_trait]
impl ClassifierOracle for ScriptedOracle {
    async fn classify(
        &self,
        model: &str,
        req: &ClassificationRequest,
    ) -> Result<Verdict, PipelineError> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), req.text.clone()));
        self.criteria_seen
            .lock()
            .unwrap()
            .push(req.learned_criteria.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn rejected(reason: &str) -> Result<Verdict, PipelineError> {
    Ok(Verdict::Rejected {
        reason: reason.to_string(),
    })
}

pub fn opportunity(company: &str, summary: &str) -> Result<Verdict, PipelineError> {
    Ok(Verdict::Opportunity(OpportunityDetails {
        company_name: company.to_string(),
        opportunity_summary: summary.to_string(),
        fit_rationale: "Corporate venture building".to_string(),
        proposed_solution: "Launch a new digital business line".to_string(),
        value_proposition: "Faster time to market".to_string(),
    }))
}

/// Notifier with a switchable outcome that keeps what it was sent.
pub struct RecordingNotifier {
    pub succeed: AtomicBool,
    pub sent: Mutex<Vec<(OpportunityPayload, Option<String>)>>,
}

impl RecordingNotifier {
    pub fn new(succeed: bool) -> Self {
        Self {
            succeed: AtomicBool::new(succeed),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, payload: &OpportunityPayload, region: Option<&str>) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((payload.clone(), region.map(str::to_string)));
        self.succeed.load(Ordering::SeqCst)
    }
}

/// MemoryStore wrapper counting pending inserts (they are cleared at cycle end).
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub pending_inserts: AtomicUsize,
}

#[async_trait]
impl Store for CountingStore {
    async fn record_opportunity(
        &self,
        item: &CandidateItem,
        details: &OpportunityDetails,
    ) -> Result<(), StoreError> {
        self.inner.record_opportunity(item, details).await
    }
    async fn mark_notified(&self, source_url: &str) -> Result<(), StoreError> {
        self.inner.mark_notified(source_url).await
    }
    async fn record_rejection(&self, item: &CandidateItem, reason: &str) -> Result<(), StoreError> {
        self.inner.record_rejection(item, reason).await
    }
    async fn record_pending(&self, item: &CandidateItem) -> Result<(), StoreError> {
        self.pending_inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.record_pending(item).await
    }
    async fn clear_pending(&self) -> Result<usize, StoreError> {
        self.inner.clear_pending().await
    }
    async fn query_urls(&self) -> Result<HashSet<String>, StoreError> {
        self.inner.query_urls().await
    }
    async fn query_recent_notified(&self, days: u32) -> Result<Vec<RecentOpportunity>, StoreError> {
        self.inner.query_recent_notified(days).await
    }
    async fn set_status(&self, source_url: &str, status: RecordStatus) -> Result<(), StoreError> {
        self.inner.set_status(source_url, status).await
    }
    async fn feedback_examples(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        self.inner.feedback_examples(limit).await
    }
    async fn labeled_records(&self) -> Result<Vec<StoredRecord>, StoreError> {
        self.inner.labeled_records().await
    }
}

pub fn news(url: &str, text: &str) -> CandidateItem {
    CandidateItem::new(url, text, SourceType::News, Some("es"))
}

pub fn fast_settings() -> CycleSettings {
    CycleSettings {
        rate_limit: Duration::ZERO,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 1,
        },
        lookback_days: 7,
        batch_min_pass: 0,
    }
}

pub fn tiers(limits: &[(&str, u32)]) -> Vec<ProviderTier> {
    limits.iter().map(|(n, l)| ProviderTier::new(*n, *l)).collect()
}

/// Orchestrator with a pass-through relevance filter (no embedder, no bayes model).
pub fn orchestrator(
    store: Arc<dyn Store>,
    oracle: Arc<ScriptedOracle>,
    notifier: Arc<RecordingNotifier>,
    tiers: Vec<ProviderTier>,
) -> Orchestrator {
    orchestrator_with_filter(
        store,
        oracle,
        notifier,
        tiers,
        RelevanceFilter::new(semantic(None), None),
    )
}

pub fn orchestrator_with_filter(
    store: Arc<dyn Store>,
    oracle: Arc<ScriptedOracle>,
    notifier: Arc<RecordingNotifier>,
    tiers: Vec<ProviderTier>,
    filter: RelevanceFilter,
) -> Orchestrator {
    orchestrator_with(store, oracle, notifier, tiers, filter, fast_settings())
}

pub fn orchestrator_with(
    store: Arc<dyn Store>,
    oracle: Arc<ScriptedOracle>,
    notifier: Arc<RecordingNotifier>,
    tiers: Vec<ProviderTier>,
    filter: RelevanceFilter,
    settings: CycleSettings,
) -> Orchestrator {
    Orchestrator::new(
        store,
        oracle,
        notifier,
        filter,
        Deduplicator::default(),
        CallBudget::new(tiers),
        settings,
    )
}
