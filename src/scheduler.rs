// src/scheduler.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::ingest::{self, SourceProvider};
use crate::pipeline::{CycleReport, Orchestrator};
use crate::relevance::TrainingStats;

/// What the HTTP surface reports about the background pipeline.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStatus {
    pub cycles: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
    pub training: Option<TrainingStats>,
}

pub type SharedStatus = Arc<RwLock<PipelineStatus>>;

/// Collect from every provider and run one cycle; the outcome lands in `status`.
pub async fn run_once(
    orchestrator: &Mutex<Orchestrator>,
    providers: &[Box<dyn SourceProvider>],
    status: &SharedStatus,
) -> Option<CycleReport> {
    let items = ingest::collect(providers).await;
    let mut orch = orchestrator.lock().await;
    let result = orch.run_cycle(items).await;
    let training = orch.training_stats();
    drop(orch);

    let mut st = status.write().unwrap_or_else(|e| e.into_inner());
    st.cycles += 1;
    st.last_run_at = Some(Utc::now());
    st.training = Some(training);
    match result {
        Ok(report) => {
            st.last_error = None;
            st.last_report = Some(report.clone());
            Some(report)
        }
        Err(e) => {
            tracing::error!(target: "pipeline", error = %e, "cycle aborted");
            st.last_error = Some(e.to_string());
            None
        }
    }
}

/// Run a cycle every `interval`, the first one immediately.
pub fn spawn_cycle_scheduler(
    orchestrator: Arc<Mutex<Orchestrator>>,
    providers: Vec<Box<dyn SourceProvider>>,
    interval: Duration,
    status: SharedStatus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(r) = run_once(&orchestrator, &providers, &status).await {
                tracing::info!(
                    target: "pipeline",
                    opportunities = r.new_opportunities,
                    calls = r.calls_made,
                    "scheduled cycle done"
                );
            }
        }
    })
}
