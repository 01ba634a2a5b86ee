//! Cache backend contract.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::TaskRecord;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache payload could not be encoded: {0}")]
    Codec(String),
}

impl CacheError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Result of a pipelined multi-get. Every requested id lands in exactly one side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkGet {
    pub hits: Vec<TaskRecord>,
    pub misses: Vec<String>,
}

impl BulkGet {
    /// Every id is a miss; used when the backend cannot be consulted.
    pub fn all_missing(ids: &[String]) -> Self {
        Self {
            hits: Vec::new(),
            misses: ids.to_vec(),
        }
    }
}

/// Key/value task cache with a separate membership index.
///
/// Entry writes and index writes are independent calls; nothing here is atomic across
/// the two.
#[async_trait]
pub trait TaskCache: Send + Sync {
    async fn set(&self, task: &TaskRecord, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, id: &str) -> Result<(), CacheError>;

    /// Fetch all ids in a single round trip. Undecodable payloads count as misses.
    async fn bulk_get(&self, ids: &[String]) -> Result<BulkGet, CacheError>;

    async fn index_add(&self, id: &str) -> Result<(), CacheError>;

    async fn index_remove(&self, id: &str) -> Result<(), CacheError>;

    async fn index_members(&self) -> Result<Vec<String>, CacheError>;

    /// Replace the whole index with `ids`; an empty slice clears it.
    async fn index_replace(&self, ids: &[String]) -> Result<(), CacheError>;
}
