// src/metrics.rs
use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if a recorder is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_pipeline_metrics();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time registration so series show up on /metrics before the first cycle.
pub fn describe_pipeline_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_items_total", "Candidate items seen by the orchestrator.");
        describe_counter!(
            "pipeline_skipped_total",
            "Items skipped before classification, by stage (seen, filtered, duplicate)."
        );
        describe_counter!(
            "pipeline_classify_calls_total",
            "Classification calls started, by provider tier."
        );
        describe_counter!("pipeline_opportunities_total", "Opportunities accepted.");
        describe_counter!("pipeline_rejections_total", "Items rejected by the oracle.");
        describe_counter!(
            "pipeline_pending_total",
            "Items queued as pending after a failed classification."
        );
        describe_gauge!("pipeline_budget_calls_made", "Calls consumed in the current cycle.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the last cycle finished.");
    });
}
