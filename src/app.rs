// src/app.rs
//! Wiring shared by the service entrypoint and the operator binaries.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::budget::CallBudget;
use crate::classify::{LearnedCriteria, OpenAiClassifier};
use crate::config::PipelineConfig;
use crate::dedup::Deduplicator;
use crate::notify::{ChannelRouter, ChannelsConfig, LogNotifier, Notifier, SlackNotifier};
use crate::pipeline::{CycleSettings, Orchestrator};
use crate::relevance::{
    BayesFilter, Embedder, JsonTrainingRepository, OpenAiEmbedder, RelevanceFilter, SemanticFilter,
};
use crate::store::JsonFileStore;

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines;
/// `RUST_LOG` overrides `default_filter`. Safe to call twice (second call is a no-op).
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing already initialised");
    }
}

pub fn open_store(cfg: &PipelineConfig) -> Result<Arc<JsonFileStore>> {
    let store = JsonFileStore::open(cfg.records_path())
        .with_context(|| format!("opening store {}", cfg.records_path().display()))?;
    Ok(Arc::new(store))
}

/// Semantic filter over the on-disk training set; no embedder when `OPENAI_API_KEY` is unset.
pub fn build_semantic_filter(cfg: &PipelineConfig) -> SemanticFilter {
    let embedder: Option<Arc<dyn Embedder>> = match OpenAiEmbedder::from_env() {
        Some(e) => Some(Arc::new(e)),
        None => {
            tracing::warn!(target: "relevance", "no embedding backend; semantic filter passes everything");
            None
        }
    };
    SemanticFilter::new(
        embedder,
        Box::new(JsonTrainingRepository::new(cfg.training_path())),
        cfg.semantic_params(),
    )
}

fn load_bayes(cfg: &PipelineConfig) -> Option<BayesFilter> {
    let path = cfg.bayes_model_path();
    if !path.exists() {
        return None;
    }
    match BayesFilter::load(&path) {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(target: "relevance", error = ?e, "bayes model unreadable; ignoring");
            None
        }
    }
}

fn build_notifier() -> Result<Arc<dyn Notifier>> {
    let router = ChannelRouter::new(ChannelsConfig::load_default()?);
    let slack = SlackNotifier::from_env(router);
    if slack.is_configured() {
        Ok(Arc::new(slack))
    } else {
        tracing::warn!(target: "notify", "SLACK_BOT_TOKEN unset; opportunities are only logged");
        Ok(Arc::new(LogNotifier))
    }
}

/// Full production wiring. Requires `OPENAI_API_KEY` for classification.
pub fn build_orchestrator(cfg: &PipelineConfig, store: Arc<JsonFileStore>) -> Result<Orchestrator> {
    let oracle = OpenAiClassifier::from_env().context("OPENAI_API_KEY is required for classification")?;
    let criteria = LearnedCriteria::load(&cfg.criteria_path())?;
    let relevance = RelevanceFilter::new(build_semantic_filter(cfg), load_bayes(cfg));
    let dedup = Deduplicator::new(cfg.dedup.thresholds, i64::from(cfg.dedup.lookback_days));

    Ok(Orchestrator::new(
        store,
        Arc::new(oracle),
        build_notifier()?,
        relevance,
        dedup,
        CallBudget::new(cfg.tiers.clone()),
        CycleSettings::from_config(cfg),
    )
    .with_criteria(criteria))
}
