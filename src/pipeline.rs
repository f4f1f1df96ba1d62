// src/pipeline.rs
//! Per-item orchestration, cheapest checks first:
//! URL seen → pre-filter → dedup → budget → classify → record / notify / learn.
//!
//! Strictly sequential. The relevance gate judges the cycle's fresh items as one batch
//! so a minimum number always reaches the oracle; the recent-opportunity window is read
//! at the start of a cycle and grows in place, so later items see earlier deliveries.

use chrono::Utc;
use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analyze::anon_hash;
use crate::budget::CallBudget;
use crate::classify::{
    classify_with_retry, criteria_from_examples, ClassificationRequest, ClassifierOracle,
    LearnedCriteria, OpportunityDetails, RetryPolicy, Verdict,
};
use crate::config::PipelineConfig;
use crate::dedup::{Deduplicator, RecentOpportunity};
use crate::error::PipelineError;
use crate::ingest::CandidateItem;
use crate::metrics::describe_pipeline_metrics;
use crate::notify::{Notifier, OpportunityPayload};
use crate::relevance::{RelevanceFilter, TrainingStats};
use crate::store::{Store, StoreError};

/// Fallback headlines pulled into the prompt when no distilled criteria exist.
const FEEDBACK_EXAMPLES: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Items that got past the URL check.
    pub processed: usize,
    pub new_opportunities: usize,
    pub rejections: usize,
    /// Subset of `rejections` caused by an unusable oracle reply.
    pub malformed: usize,
    pub duplicates: usize,
    pub filtered: usize,
    pub skipped_seen: usize,
    pub pending: usize,
    pub notify_failures: usize,
    pub calls_made: u32,
    pub budget_exhausted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CycleSettings {
    /// Pause before every classification call, whatever the tier.
    pub rate_limit: Duration,
    pub retry: RetryPolicy,
    pub lookback_days: u32,
    /// Fresh items the pre-filter lets through per cycle even when it would reject them.
    pub batch_min_pass: usize,
}

impl CycleSettings {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            rate_limit: Duration::from_secs(cfg.rate_limit_secs),
            retry: cfg.retry,
            lookback_days: cfg.dedup.lookback_days,
            batch_min_pass: cfg.relevance.batch_min_pass,
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    oracle: Arc<dyn ClassifierOracle>,
    notifier: Arc<dyn Notifier>,
    relevance: RelevanceFilter,
    dedup: Deduplicator,
    budget: CallBudget,
    criteria: Option<LearnedCriteria>,
    settings: CycleSettings,
}

enum Outcome {
    Opportunity { delivered: bool },
    Rejected { malformed: bool },
    Pending,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        oracle: Arc<dyn ClassifierOracle>,
        notifier: Arc<dyn Notifier>,
        relevance: RelevanceFilter,
        dedup: Deduplicator,
        budget: CallBudget,
        settings: CycleSettings,
    ) -> Self {
        describe_pipeline_metrics();
        Self {
            store,
            oracle,
            notifier,
            relevance,
            dedup,
            budget,
            criteria: None,
            settings,
        }
    }

    pub fn with_criteria(mut self, criteria: Option<LearnedCriteria>) -> Self {
        self.criteria = criteria.filter(|c| !c.is_empty());
        self
    }

    pub fn budget(&self) -> &CallBudget {
        &self.budget
    }

    pub fn relevance(&mut self) -> &mut RelevanceFilter {
        &mut self.relevance
    }

    pub fn training_stats(&mut self) -> TrainingStats {
        self.relevance.stats()
    }

    /// Learned criteria and guidance blocks for this cycle's prompts.
    async fn prompt_context(&self) -> (String, String) {
        if let Some(c) = &self.criteria {
            return (c.format_for_prompt(), c.extraction_guidance());
        }
        match self.store.feedback_examples(FEEDBACK_EXAMPLES).await {
            Ok(headlines) => (criteria_from_examples(&headlines), String::new()),
            Err(e) => {
                warn!(target: "pipeline", error = %e, "feedback examples unavailable");
                (String::new(), String::new())
            }
        }
    }

    /// Run one cycle over `items`. Only failing to read the store's URL set or
    /// dedup window aborts the cycle.
    pub async fn run_cycle(&mut self, items: Vec<CandidateItem>) -> Result<CycleReport, StoreError> {
        self.budget.reset();
        let mut report = CycleReport::default();

        let mut seen: HashSet<String> = self.store.query_urls().await?;
        let mut recent: Vec<RecentOpportunity> = self
            .store
            .query_recent_notified(self.settings.lookback_days)
            .await?;
        let (criteria, guidance) = self.prompt_context().await;
        let mut last_tier: Option<String> = None;
        let filter_tier = self.relevance.active_tier();

        info!(
            target: "pipeline",
            items = items.len(),
            known_urls = seen.len(),
            recent = recent.len(),
            filter = ?filter_tier,
            "cycle started"
        );

        let mut fresh: Vec<CandidateItem> = Vec::with_capacity(items.len());
        for item in items {
            counter!("pipeline_items_total").increment(1);
            if !seen.insert(item.source_url.clone()) {
                report.skipped_seen += 1;
                counter!("pipeline_skipped_total", "stage" => "seen").increment(1);
                continue;
            }
            fresh.push(item);
        }
        report.processed = fresh.len();

        let texts: Vec<&str> = fresh.iter().map(|i| i.raw_text.as_str()).collect();
        let passes = self
            .relevance
            .pre_filter_batch(&texts, self.settings.batch_min_pass)
            .await;

        for (item, pass) in fresh.into_iter().zip(passes) {
            let id = anon_hash(&item.source_url);

            if !pass {
                report.filtered += 1;
                counter!("pipeline_skipped_total", "stage" => "filtered").increment(1);
                debug!(target: "pipeline", %id, "filtered before classification");
                continue;
            }

            if let Some(m) = self
                .dedup
                .find_duplicate(&item.raw_text, None, &recent, Utc::now())
            {
                report.duplicates += 1;
                counter!("pipeline_skipped_total", "stage" => "duplicate").increment(1);
                info!(target: "pipeline", %id, reason = %m.reason, similar_to = %m.source_url, "duplicate story skipped");
                continue;
            }

            let tier = match self.budget.consume() {
                Ok(t) => t,
                Err(e) => {
                    report.budget_exhausted = true;
                    warn!(target: "budget", total = self.budget.total(), error = %e, "halting cycle");
                    break;
                }
            };
            if last_tier.as_deref() != Some(tier.name.as_str()) {
                info!(
                    target: "budget",
                    tier = %tier.name,
                    call = self.budget.calls_made(),
                    total = self.budget.total(),
                    "classification tier"
                );
                last_tier = Some(tier.name.clone());
            }
            gauge!("pipeline_budget_calls_made").set(f64::from(self.budget.calls_made()));

            tokio::time::sleep(self.settings.rate_limit).await;

            let req = ClassificationRequest {
                text: item.raw_text.clone(),
                source_type: item.source_type,
                learned_criteria: criteria.clone(),
                guidance: guidance.clone(),
            };
            counter!("pipeline_classify_calls_total", "tier" => tier.name.clone()).increment(1);
            let result =
                classify_with_retry(self.oracle.as_ref(), &tier.name, &req, self.settings.retry).await;

            match self.handle_result(&item, result, &mut recent).await {
                Outcome::Opportunity { delivered } => {
                    report.new_opportunities += 1;
                    if !delivered {
                        report.notify_failures += 1;
                    }
                }
                Outcome::Rejected { malformed } => {
                    report.rejections += 1;
                    if malformed {
                        report.malformed += 1;
                    }
                }
                Outcome::Pending => report.pending += 1,
            }
        }

        match self.store.clear_pending().await {
            Ok(n) if n > 0 => debug!(target: "pipeline", cleared = n, "pending records cleared"),
            Ok(_) => {}
            Err(e) => warn!(target: "pipeline", error = %e, "clear_pending failed"),
        }

        report.calls_made = self.budget.calls_made();
        gauge!("pipeline_budget_calls_made").set(f64::from(report.calls_made));
        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp() as f64);
        info!(
            target: "pipeline",
            processed = report.processed,
            opportunities = report.new_opportunities,
            rejections = report.rejections,
            duplicates = report.duplicates,
            filtered = report.filtered,
            pending = report.pending,
            calls = report.calls_made,
            budget_exhausted = report.budget_exhausted,
            "cycle finished"
        );
        Ok(report)
    }

    async fn handle_result(
        &mut self,
        item: &CandidateItem,
        result: Result<Verdict, PipelineError>,
        recent: &mut Vec<RecentOpportunity>,
    ) -> Outcome {
        match result {
            Ok(Verdict::Opportunity(details)) => {
                let delivered = self.accept(item, details, recent).await;
                Outcome::Opportunity { delivered }
            }
            Ok(Verdict::Rejected { reason }) => {
                self.reject(item, &reason).await;
                Outcome::Rejected { malformed: false }
            }
            Err(PipelineError::MalformedVerdict(msg)) => {
                warn!(target: "classify", id = %anon_hash(&item.source_url), error = %msg, "malformed verdict; treating as rejection");
                self.reject(item, &format!("malformed verdict: {msg}")).await;
                Outcome::Rejected { malformed: true }
            }
            Err(e) => {
                self.budget.refund();
                warn!(target: "classify", id = %anon_hash(&item.source_url), error = %e, "classification failed; queued as pending");
                counter!("pipeline_pending_total").increment(1);
                if let Err(se) = self.store.record_pending(item).await {
                    log_store_error("record_pending", &se);
                }
                Outcome::Pending
            }
        }
    }

    async fn accept(
        &mut self,
        item: &CandidateItem,
        details: OpportunityDetails,
        recent: &mut Vec<RecentOpportunity>,
    ) -> bool {
        counter!("pipeline_opportunities_total").increment(1);
        if let Err(e) = self.store.record_opportunity(item, &details).await {
            log_store_error("record_opportunity", &e);
        }

        let payload = OpportunityPayload {
            source_url: item.source_url.clone(),
            country: item.country.clone(),
            details,
        };
        let delivered = self
            .notifier
            .notify(&payload, item.country.as_deref())
            .await;

        // Only delivered opportunities join the dedup window.
        if delivered {
            if let Err(e) = self.store.mark_notified(&item.source_url).await {
                log_store_error("mark_notified", &e);
            }
            recent.push(RecentOpportunity {
                headline: payload.details.opportunity_summary.clone(),
                company_name: Some(payload.details.company_name.clone()),
                source_url: item.source_url.clone(),
                notified_at: Some(Utc::now()),
            });
            info!(target: "pipeline", company = %payload.details.company_name, "opportunity notified");
        } else {
            warn!(target: "notify", url = %item.source_url, "notification failed; record kept");
        }

        self.relevance.learn_relevant(&item.raw_text).await;
        delivered
    }

    async fn reject(&mut self, item: &CandidateItem, reason: &str) {
        counter!("pipeline_rejections_total").increment(1);
        if let Err(e) = self.store.record_rejection(item, reason).await {
            log_store_error("record_rejection", &e);
        }
        debug!(target: "pipeline", id = %anon_hash(&item.source_url), reason, "rejected by oracle");
        self.relevance.learn_rejected(&item.raw_text, reason).await;
    }
}

fn log_store_error(op: &str, e: &StoreError) {
    if e.is_conflict() {
        debug!(target: "store", op, error = %e, "already known; ignored");
    } else {
        warn!(target: "store", op, error = %e, "store write failed");
    }
}
