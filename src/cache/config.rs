//! Cache configuration.

use std::time::Duration;

const DEFAULT_TTL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every cache operation is skipped and reads go to the read store.
    pub enabled: bool,
    /// `redis://` URL. `None` selects the in-process backend.
    pub url: Option<String>,
    /// Lifetime of an individual cached task.
    pub ttl: Duration,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            key_prefix: String::new(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            url: settings.url.clone(),
            ttl: settings.ttl,
            key_prefix: settings.key_prefix.clone(),
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn uses_redis(&self) -> bool {
        self.url.is_some()
    }
}
