// src/config/pipeline.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::budget::ProviderTier;
use crate::classify::RetryPolicy;
use crate::dedup::DedupThresholds;
use crate::relevance::semantic::{DEFAULT_MIN_POSITIVE_EXAMPLES, DEFAULT_THRESHOLD};
use crate::relevance::training::DEFAULT_MAX_EXAMPLES_PER_LABEL;
use crate::relevance::SemanticParams;

const ENV_PATH: &str = "PIPELINE_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/pipeline.toml";

fn default_tiers() -> Vec<ProviderTier> {
    vec![
        ProviderTier::new("gpt-4o-mini", 20),
        ProviderTier::new("gpt-4.1-mini", 20),
        ProviderTier::new("gpt-4.1-nano", 20),
    ]
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelevanceSection {
    pub threshold: f32,
    pub min_positive_examples: usize,
    pub max_examples_per_label: usize,
    /// Minimum items a batch prediction lets through.
    pub batch_min_pass: usize,
}

impl Default for RelevanceSection {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_positive_examples: DEFAULT_MIN_POSITIVE_EXAMPLES,
            max_examples_per_label: DEFAULT_MAX_EXAMPLES_PER_LABEL,
            batch_min_pass: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DedupSection {
    pub lookback_days: u32,
    #[serde(flatten)]
    pub thresholds: DedupThresholds,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            thresholds: DedupThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tiers: Vec<ProviderTier>,
    /// Fixed pause before every classification call.
    pub rate_limit_secs: u64,
    /// Scheduler period between cycles.
    pub cycle_interval_secs: u64,
    pub data_dir: PathBuf,
    /// Collector drop file, relative to `data_dir` unless absolute.
    pub incoming_file: PathBuf,
    pub relevance: RelevanceSection,
    pub dedup: DedupSection,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            rate_limit_secs: 15,
            cycle_interval_secs: 3600,
            data_dir: PathBuf::from("data"),
            incoming_file: PathBuf::from("incoming.json"),
            relevance: RelevanceSection::default(),
            dedup: DedupSection::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn parse(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("parsing pipeline config")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        Self::parse(&raw)
    }

    /// `$PIPELINE_CONFIG_PATH`, then `config/pipeline.toml`, else defaults; then env overrides.
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                anyhow::bail!("{ENV_PATH} points to non-existent path");
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                Self::default()
            }
        };
        Ok(base.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(t) = env::var("RELEVANCE_THRESHOLD")
            .ok()
            .and_then(|v| v.trim().parse::<f32>().ok())
        {
            self.relevance.threshold = t;
        }
        if let Some(s) = env::var("PIPELINE_RATE_LIMIT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.rate_limit_secs = s;
        }
        self.sanitized()
    }

    /// Clamp out-of-range values instead of rejecting the file.
    pub fn sanitized(mut self) -> Self {
        let r = &mut self.relevance;
        if !r.threshold.is_finite() {
            r.threshold = DEFAULT_THRESHOLD;
        }
        r.threshold = r.threshold.clamp(0.0, 1.0);
        r.max_examples_per_label = r.max_examples_per_label.max(1);

        self.tiers.retain(|t| t.limit > 0 && !t.name.trim().is_empty());
        if self.tiers.is_empty() {
            self.tiers = default_tiers();
        }
        self.dedup.lookback_days = self.dedup.lookback_days.max(1);
        self.dedup.thresholds = self.dedup.thresholds.sanitized();
        self.retry = self.retry.sanitized();
        self.cycle_interval_secs = self.cycle_interval_secs.max(1);
        self
    }

    pub fn semantic_params(&self) -> SemanticParams {
        SemanticParams {
            threshold: self.relevance.threshold,
            min_positive_examples: self.relevance.min_positive_examples,
            max_examples_per_label: self.relevance.max_examples_per_label,
        }
    }

    pub fn data_path(&self, file: impl AsRef<Path>) -> PathBuf {
        let f = file.as_ref();
        if f.is_absolute() {
            f.to_path_buf()
        } else {
            self.data_dir.join(f)
        }
    }

    pub fn records_path(&self) -> PathBuf {
        self.data_path("records.json")
    }

    pub fn training_path(&self) -> PathBuf {
        self.data_path("semantic_training.json")
    }

    pub fn bayes_model_path(&self) -> PathBuf {
        self.data_path("filter_model.json")
    }

    pub fn criteria_path(&self) -> PathBuf {
        self.data_path("distilled_rules.json")
    }

    pub fn incoming_path(&self) -> PathBuf {
        self.data_path(&self.incoming_file)
    }
}
