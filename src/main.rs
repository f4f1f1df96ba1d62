//! Lead pipeline service: runs collection cycles on a schedule and serves
//! `/health`, `/stats` and `/metrics`.

use lead_hunter::api::{router, AppState};
use lead_hunter::app::{build_orchestrator, init_tracing, open_store};
use lead_hunter::config::PipelineConfig;
use lead_hunter::ingest::{JsonFileProvider, SourceProvider};
use lead_hunter::metrics::Metrics;
use lead_hunter::scheduler::{spawn_cycle_scheduler, SharedStatus};
use shuttle_axum::ShuttleAxum;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing("pipeline=info,budget=info,notify=info,warn");

    let cfg = PipelineConfig::load_default()?;
    let metrics = Metrics::init()?;

    let store = open_store(&cfg)?;
    let orchestrator = build_orchestrator(&cfg, store)?;

    let providers: Vec<Box<dyn SourceProvider>> =
        vec![Box::new(JsonFileProvider::new(cfg.incoming_path()))];
    let status = SharedStatus::default();
    spawn_cycle_scheduler(
        Arc::new(Mutex::new(orchestrator)),
        providers,
        Duration::from_secs(cfg.cycle_interval_secs),
        status.clone(),
    );

    let app = router(AppState::new(status)).merge(metrics.router());
    tracing::info!(
        tiers = cfg.tiers.len(),
        interval_secs = cfg.cycle_interval_secs,
        "lead pipeline service started"
    );
    Ok(app.into())
}
