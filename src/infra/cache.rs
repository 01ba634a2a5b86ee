//! Cache backend selection.

use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheConfig, CacheHandle, CacheKeys, MemoryTaskCache, TaskCache};

use super::error::InfraError;
use super::redis_cache::RedisTaskCache;

/// Build the cache front described by `config`: disabled, Redis, or in-process.
pub async fn connect(config: &CacheConfig) -> Result<CacheHandle, InfraError> {
    if !config.is_enabled() {
        info!(target = "taskflow::cache", "task cache disabled");
        return Ok(CacheHandle::disabled());
    }

    let backend: Arc<dyn TaskCache> = match config.url.as_deref() {
        Some(url) => {
            let keys = CacheKeys::new(config.key_prefix.clone());
            Arc::new(RedisTaskCache::connect(url, keys).await?)
        }
        None => {
            info!(
                target = "taskflow::cache",
                "no cache URL configured; using in-process task cache"
            );
            Arc::new(MemoryTaskCache::new())
        }
    };

    Ok(CacheHandle::new(backend, config.ttl))
}
