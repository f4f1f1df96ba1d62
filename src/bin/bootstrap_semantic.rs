//! Seed the semantic filter's training set from stored outcomes and human feedback.

use anyhow::Result;
use lead_hunter::app::{build_semantic_filter, init_tracing};
use lead_hunter::config::PipelineConfig;
use lead_hunter::relevance::bootstrap_from_store;
use lead_hunter::store::JsonFileStore;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    let cfg = PipelineConfig::load_default()?;
    let store = JsonFileStore::open(cfg.records_path())?;
    let mut filter = build_semantic_filter(&cfg);
    let report = bootstrap_from_store(&mut filter, &store).await?;
    let stats = filter.stats();

    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!(
        positives = stats.positive_count,
        negatives = stats.negative_count,
        "training set now"
    );
    Ok(())
}
