// src/store/memory.rs
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::Mutex;

use super::{RecordStatus, RecordTable, Store, StoreError, StoredRecord};
use crate::classify::OpportunityDetails;
use crate::dedup::RecentOpportunity;
use crate::ingest::CandidateItem;

/// Process-local store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    table: Mutex<RecordTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = StoredRecord>) -> Result<Self, StoreError> {
        let mut table = RecordTable::default();
        for r in records {
            table.insert(r)?;
        }
        Ok(Self {
            table: Mutex::new(table),
        })
    }

    pub async fn snapshot(&self) -> RecordTable {
        self.table.lock().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn record_opportunity(
        &self,
        item: &CandidateItem,
        details: &OpportunityDetails,
    ) -> Result<(), StoreError> {
        self.table
            .lock()
            .await
            .insert(StoredRecord::opportunity(item, details, Utc::now()))
    }

    async fn mark_notified(&self, source_url: &str) -> Result<(), StoreError> {
        self.table.lock().await.mark_notified(source_url, Utc::now())
    }

    async fn record_rejection(&self, item: &CandidateItem, reason: &str) -> Result<(), StoreError> {
        self.table
            .lock()
            .await
            .insert(StoredRecord::rejection(item, reason, Utc::now()))
    }

    async fn record_pending(&self, item: &CandidateItem) -> Result<(), StoreError> {
        self.table
            .lock()
            .await
            .insert(StoredRecord::pending(item, Utc::now()))
    }

    async fn clear_pending(&self) -> Result<usize, StoreError> {
        Ok(self.table.lock().await.clear_pending())
    }

    async fn query_urls(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.table.lock().await.urls())
    }

    async fn query_recent_notified(&self, days: u32) -> Result<Vec<RecentOpportunity>, StoreError> {
        Ok(self.table.lock().await.recent_notified(days, Utc::now()))
    }

    async fn set_status(&self, source_url: &str, status: RecordStatus) -> Result<(), StoreError> {
        self.table.lock().await.set_status(source_url, status)
    }

    async fn feedback_examples(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        Ok(self.table.lock().await.feedback_examples(limit))
    }

    async fn labeled_records(&self) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self.table.lock().await.labeled())
    }
}
