// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[serde(alias = "noticia", alias = "article")]
    News,
    #[serde(alias = "vacante", alias = "job")]
    JobPosting,
}

impl SourceType {
    pub fn label(&self) -> &'static str {
        match self {
            SourceType::News => "news",
            SourceType::JobPosting => "job posting",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One collected record. `source_url` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub source_url: String,
    #[serde(alias = "content", alias = "text")]
    pub raw_text: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub country: Option<String>,
}

impl CandidateItem {
    pub fn new(
        source_url: impl Into<String>,
        raw_text: impl Into<String>,
        source_type: SourceType,
        country: Option<&str>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            raw_text: raw_text.into(),
            source_type,
            country: country.map(str::to_string),
        }
    }

    /// First sentence of the text, used as a stand-in headline for non-opportunity records.
    pub fn headline(&self) -> String {
        let first = self
            .raw_text
            .split_terminator(". ")
            .next()
            .unwrap_or(&self.raw_text)
            .trim();
        first.chars().take(200).collect()
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>>;
    fn name(&self) -> &'static str;
}
