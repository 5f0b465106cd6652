//! Process-local query repository

use super::{QueryRecord, QueryRepository};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Query records kept in insertion order behind a read/write lock
#[derive(Default)]
pub struct MemoryQueryStore {
    records: RwLock<Vec<QueryRecord>>,
}

impl MemoryQueryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueryRepository for MemoryQueryStore {
    async fn save(&self, record: &QueryRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(Error::InvalidRequest(format!(
                "Query {} already exists",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<QueryRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<QueryRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    async fn update(&self, record: &QueryRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let slot = records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| Error::QueryNotFound(record.id.clone()))?;
        *slot = record.clone();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() < before)
    }
}
