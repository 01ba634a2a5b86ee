//! In-process cache backend.
//!
//! Entries keep the serialized task and a deadline; expired entries are dropped lazily
//! on read. The index is a plain set with no deadline.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::domain::entities::TaskRecord;

use super::lock::{rw_read, rw_write};
use super::store::{BulkGet, CacheError, TaskCache};

const SOURCE: &str = "cache::memory";

struct Entry {
    payload: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryTaskCache {
    entries: RwLock<HashMap<String, Entry>>,
    index: RwLock<HashSet<String>>,
}

impl MemoryTaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries. Expired entries that were not yet read are excluded.
    pub fn live_entries(&self) -> usize {
        let now = Instant::now();
        rw_read(&self.entries, SOURCE, "live_entries")
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }
}

#[async_trait]
impl TaskCache for MemoryTaskCache {
    async fn set(&self, task: &TaskRecord, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(task).map_err(CacheError::codec)?;
        let entry = Entry {
            payload,
            expires_at: Instant::now() + ttl,
        };
        rw_write(&self.entries, SOURCE, "set").insert(task.id.clone(), entry);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "delete").remove(id);
        Ok(())
    }

    async fn bulk_get(&self, ids: &[String]) -> Result<BulkGet, CacheError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "bulk_get");
        let mut result = BulkGet::default();

        for id in ids {
            let live = match entries.get(id) {
                Some(entry) if entry.expires_at > now => Some(entry.payload.clone()),
                _ => None,
            };
            if live.is_none() {
                entries.remove(id);
            }

            match live.as_deref().map(serde_json::from_str::<TaskRecord>) {
                Some(Ok(task)) => result.hits.push(task),
                Some(Err(_)) | None => result.misses.push(id.clone()),
            }
        }

        Ok(result)
    }

    async fn index_add(&self, id: &str) -> Result<(), CacheError> {
        rw_write(&self.index, SOURCE, "index_add").insert(id.to_string());
        Ok(())
    }

    async fn index_remove(&self, id: &str) -> Result<(), CacheError> {
        rw_write(&self.index, SOURCE, "index_remove").remove(id);
        Ok(())
    }

    async fn index_members(&self) -> Result<Vec<String>, CacheError> {
        Ok(rw_read(&self.index, SOURCE, "index_members")
            .iter()
            .cloned()
            .collect())
    }

    async fn index_replace(&self, ids: &[String]) -> Result<(), CacheError> {
        let mut index = rw_write(&self.index, SOURCE, "index_replace");
        index.clear();
        index.extend(ids.iter().cloned());
        Ok(())
    }
}
