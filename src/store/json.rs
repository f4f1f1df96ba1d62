// src/store/json.rs
//! File-backed store: the whole table as one JSON document, rewritten atomically
//! (tmp + rename) after every mutation.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

use super::{RecordStatus, RecordTable, Store, StoreError, StoredRecord};
use crate::classify::OpportunityDetails;
use crate::dedup::RecentOpportunity;
use crate::ingest::CandidateItem;

pub struct JsonFileStore {
    path: PathBuf,
    table: Mutex<RecordTable>,
}

impl JsonFileStore {
    /// Open (or start) a store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                RecordTable::default()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            RecordTable::default()
        };
        info!(target: "store", path = %path.display(), records = table.len(), "record store opened");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to a copy, persist it, and only then publish it in memory, so a failed
    /// write leaves memory matching disk.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut RecordTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.table.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        write_atomic(&self.path, &next)?;
        *guard = next;
        Ok(out)
    }
}

fn write_atomic(path: &Path, table: &RecordTable) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(table)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl Store for JsonFileStore {
    async fn record_opportunity(
        &self,
        item: &CandidateItem,
        details: &OpportunityDetails,
    ) -> Result<(), StoreError> {
        let rec = StoredRecord::opportunity(item, details, Utc::now());
        self.mutate(|t| t.insert(rec)).await
    }

    async fn mark_notified(&self, source_url: &str) -> Result<(), StoreError> {
        self.mutate(|t| t.mark_notified(source_url, Utc::now())).await
    }

    async fn record_rejection(&self, item: &CandidateItem, reason: &str) -> Result<(), StoreError> {
        let rec = StoredRecord::rejection(item, reason, Utc::now());
        self.mutate(|t| t.insert(rec)).await
    }

    async fn record_pending(&self, item: &CandidateItem) -> Result<(), StoreError> {
        let rec = StoredRecord::pending(item, Utc::now());
        self.mutate(|t| t.insert(rec)).await
    }

    async fn clear_pending(&self) -> Result<usize, StoreError> {
        self.mutate(|t| Ok(t.clear_pending())).await
    }

    async fn query_urls(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.table.lock().await.urls())
    }

    async fn query_recent_notified(&self, days: u32) -> Result<Vec<RecentOpportunity>, StoreError> {
        Ok(self.table.lock().await.recent_notified(days, Utc::now()))
    }

    async fn set_status(&self, source_url: &str, status: RecordStatus) -> Result<(), StoreError> {
        self.mutate(|t| t.set_status(source_url, status)).await
    }

    async fn feedback_examples(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        Ok(self.table.lock().await.feedback_examples(limit))
    }

    async fn labeled_records(&self) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self.table.lock().await.labeled())
    }
}
