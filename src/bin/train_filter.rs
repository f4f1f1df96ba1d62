//! Train the Naive Bayes fallback filter from labeled store records.

use anyhow::Result;
use lead_hunter::app::init_tracing;
use lead_hunter::config::PipelineConfig;
use lead_hunter::relevance::train_bayes;
use lead_hunter::store::{JsonFileStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    let cfg = PipelineConfig::load_default()?;
    let store = JsonFileStore::open(cfg.records_path())?;
    let records = store.labeled_records().await?;
    let model = train_bayes(&records)?;
    let out = cfg.bayes_model_path();
    model.save(&out)?;

    tracing::info!(records = records.len(), path = %out.display(), "bayes filter trained");
    Ok(())
}
