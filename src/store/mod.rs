// src/store/mod.rs
//! Record store seam: what the orchestrator reads and writes per item.
//!
//! One record per `source_url`. A second insert for the same URL is a
//! [`StoreError::Conflict`], which callers treat as "already known".

pub mod json;
pub mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::classify::OpportunityDetails;
use crate::dedup::RecentOpportunity;
use crate::ingest::{CandidateItem, SourceType};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store data: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Accepted by the oracle; `notified_at` is set once delivery succeeded.
    Notified,
    AiRejected,
    /// Classification failed this cycle; removed by `clear_pending`.
    Pending,
    /// Human feedback: confirmed relevant.
    Relevant,
    /// Human feedback: marked irrelevant.
    Irrelevant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub source_url: String,
    pub status: RecordStatus,
    pub headline: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub source_type: SourceType,
    #[serde(default)]
    pub country: Option<String>,
    pub content: String,
    #[serde(default)]
    pub opportunity: Option<OpportunityDetails>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub notified_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    fn from_item(item: &CandidateItem, status: RecordStatus, now: DateTime<Utc>) -> Self {
        Self {
            source_url: item.source_url.clone(),
            status,
            headline: item.headline(),
            company_name: None,
            source_type: item.source_type,
            country: item.country.clone(),
            content: item.raw_text.clone(),
            opportunity: None,
            rejection_reason: None,
            created_at: now,
            notified_at: None,
        }
    }

    pub fn opportunity(item: &CandidateItem, details: &OpportunityDetails, now: DateTime<Utc>) -> Self {
        let mut r = Self::from_item(item, RecordStatus::Notified, now);
        r.headline = details.opportunity_summary.clone();
        r.company_name = Some(details.company_name.clone());
        r.opportunity = Some(details.clone());
        r
    }

    pub fn rejection(item: &CandidateItem, reason: &str, now: DateTime<Utc>) -> Self {
        let mut r = Self::from_item(item, RecordStatus::AiRejected, now);
        r.rejection_reason = Some(reason.to_string());
        r
    }

    pub fn pending(item: &CandidateItem, now: DateTime<Utc>) -> Self {
        Self::from_item(item, RecordStatus::Pending, now)
    }

    /// Headline and content joined, as fed to the offline trainers.
    pub fn training_text(&self) -> String {
        format!("{} {}", self.headline, self.content).trim().to_string()
    }

    fn as_recent(&self) -> RecentOpportunity {
        RecentOpportunity {
            headline: self.headline.clone(),
            company_name: self.company_name.clone(),
            source_url: self.source_url.clone(),
            notified_at: self.notified_at,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn record_opportunity(
        &self,
        item: &CandidateItem,
        details: &OpportunityDetails,
    ) -> Result<(), StoreError>;
    /// Stamp delivery time on an accepted record.
    async fn mark_notified(&self, source_url: &str) -> Result<(), StoreError>;
    async fn record_rejection(&self, item: &CandidateItem, reason: &str) -> Result<(), StoreError>;
    async fn record_pending(&self, item: &CandidateItem) -> Result<(), StoreError>;
    /// Drop all pending records; returns how many were removed.
    async fn clear_pending(&self) -> Result<usize, StoreError>;
    async fn query_urls(&self) -> Result<HashSet<String>, StoreError>;
    /// Delivered opportunities whose `notified_at` falls within the last `days`.
    async fn query_recent_notified(&self, days: u32) -> Result<Vec<RecentOpportunity>, StoreError>;
    /// Human feedback on an existing record.
    async fn set_status(&self, source_url: &str, status: RecordStatus) -> Result<(), StoreError>;
    /// Most recent human-confirmed relevant headlines, newest first.
    async fn feedback_examples(&self, limit: usize) -> Result<Vec<String>, StoreError>;
    /// Every record carrying a label (everything except pending).
    async fn labeled_records(&self) -> Result<Vec<StoredRecord>, StoreError>;
}

/// In-memory table shared by both store backends.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RecordTable {
    records: BTreeMap<String, StoredRecord>,
}

impl RecordTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<&StoredRecord> {
        self.records.get(url)
    }

    pub fn insert(&mut self, record: StoredRecord) -> Result<(), StoreError> {
        if self.records.contains_key(&record.source_url) {
            return Err(StoreError::Conflict(record.source_url));
        }
        self.records.insert(record.source_url.clone(), record);
        Ok(())
    }

    pub fn mark_notified(&mut self, url: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let rec = self
            .records
            .get_mut(url)
            .ok_or_else(|| StoreError::NotFound(url.to_string()))?;
        rec.notified_at = Some(now);
        Ok(())
    }

    pub fn set_status(&mut self, url: &str, status: RecordStatus) -> Result<(), StoreError> {
        let rec = self
            .records
            .get_mut(url)
            .ok_or_else(|| StoreError::NotFound(url.to_string()))?;
        rec.status = status;
        Ok(())
    }

    pub fn clear_pending(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| r.status != RecordStatus::Pending);
        before - self.records.len()
    }

    pub fn urls(&self) -> HashSet<String> {
        self.records.keys().cloned().collect()
    }

    pub fn recent_notified(&self, days: u32, now: DateTime<Utc>) -> Vec<RecentOpportunity> {
        let cutoff = now - Duration::days(i64::from(days));
        let mut out: Vec<&StoredRecord> = self
            .records
            .values()
            .filter(|r| r.status == RecordStatus::Notified)
            .filter(|r| r.notified_at.is_some_and(|ts| ts >= cutoff))
            .collect();
        out.sort_by_key(|r| std::cmp::Reverse(r.notified_at));
        out.into_iter().map(StoredRecord::as_recent).collect()
    }

    pub fn feedback_examples(&self, limit: usize) -> Vec<String> {
        let mut rel: Vec<&StoredRecord> = self
            .records
            .values()
            .filter(|r| r.status == RecordStatus::Relevant)
            .collect();
        rel.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        rel.into_iter().take(limit).map(|r| r.headline.clone()).collect()
    }

    pub fn labeled(&self) -> Vec<StoredRecord> {
        self.records
            .values()
            .filter(|r| r.status != RecordStatus::Pending)
            .cloned()
            .collect()
    }
}
