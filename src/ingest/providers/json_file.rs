// src/ingest/providers/json_file.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use std::path::PathBuf;
use std::time::Instant;

use crate::ingest::types::{CandidateItem, SourceProvider};

/// Reads a collector drop file: a JSON array of `{source_url, content, source_type, country}`.
/// A missing file means nothing was collected yet.
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(raw: &str) -> Result<Vec<CandidateItem>> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(raw).context("parsing candidate items")
    }
}

#[async_trait]
impl SourceProvider for JsonFileProvider {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>> {
        let t0 = Instant::now();
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        let items = Self::parse(&raw).with_context(|| format!("in {}", self.path.display()))?;
        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1000.0);
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "json_file"
    }
}
