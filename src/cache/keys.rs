//! Cache key layout: `{prefix}task:{id}` for entries, `{prefix}tasks:index` for the index.

const TASK_KEY_PREFIX: &str = "task:";
const INDEX_KEY: &str = "tasks:index";

#[derive(Debug, Clone, Default)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn task(&self, id: &str) -> String {
        format!("{}{TASK_KEY_PREFIX}{id}", self.prefix)
    }

    pub fn index(&self) -> String {
        format!("{}{INDEX_KEY}", self.prefix)
    }
}
