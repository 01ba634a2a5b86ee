//! Soft-failure front for the task cache.
//!
//! Backend errors never reach callers: writes become no-ops, the index reads as empty
//! and bulk gets report every id as missing, so queries fall back to the read store.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use crate::domain::entities::TaskRecord;

use super::store::{BulkGet, CacheError, TaskCache};

pub(crate) const METRIC_CACHE_DEGRADED: &str = "taskflow_cache_degraded_total";

#[derive(Clone)]
pub struct CacheHandle {
    backend: Option<Arc<dyn TaskCache>>,
    ttl: Duration,
}

impl CacheHandle {
    pub fn new(backend: Arc<dyn TaskCache>, ttl: Duration) -> Self {
        Self {
            backend: Some(backend),
            ttl,
        }
    }

    /// A handle that skips every cache operation.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            ttl: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Write-through of a task that should be listable: entry first, then index membership.
    pub async fn put_task(&self, task: &TaskRecord) {
        self.refresh(task).await;
        if let Some(backend) = &self.backend {
            degrade("index_add", backend.index_add(&task.id).await);
        }
    }

    /// Rewrite the entry only; index membership is left as is.
    pub async fn refresh(&self, task: &TaskRecord) {
        if let Some(backend) = &self.backend {
            degrade("set", backend.set(task, self.ttl).await);
        }
    }

    /// Drop the entry and, best-effort, its index membership.
    pub async fn forget_task(&self, id: &str) {
        if let Some(backend) = &self.backend {
            degrade("delete", backend.delete(id).await);
            degrade("index_remove", backend.index_remove(id).await);
        }
    }

    pub async fn unlist(&self, id: &str) {
        if let Some(backend) = &self.backend {
            degrade("index_remove", backend.index_remove(id).await);
        }
    }

    pub async fn bulk_get(&self, ids: &[String]) -> BulkGet {
        match &self.backend {
            Some(backend) if !ids.is_empty() => degrade("bulk_get", backend.bulk_get(ids).await)
                .unwrap_or_else(|| BulkGet::all_missing(ids)),
            _ => BulkGet::all_missing(ids),
        }
    }

    pub async fn index_members(&self) -> Vec<String> {
        match &self.backend {
            Some(backend) => degrade("index_members", backend.index_members().await)
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    pub async fn replace_index(&self, ids: &[String]) {
        if let Some(backend) = &self.backend {
            degrade("index_replace", backend.index_replace(ids).await);
        }
    }
}

fn degrade<T>(op: &'static str, result: Result<T, CacheError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            counter!(METRIC_CACHE_DEGRADED, "op" => op).increment(1);
            warn!(
                target = "taskflow::cache",
                op,
                error = %err,
                "cache operation skipped"
            );
            None
        }
    }
}
