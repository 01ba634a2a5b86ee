//! Read side: cache-aside lookups over the read store with a self-healing list index.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info};

use crate::{
    application::{
        error::TaskServiceError,
        repos::{RepoError, TaskReadRepo},
    },
    cache::{BulkGet, CacheHandle},
    domain::entities::TaskRecord,
};

pub(crate) const METRIC_CACHE_HIT: &str = "taskflow_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "taskflow_cache_miss_total";
pub(crate) const METRIC_CACHE_REFILL: &str = "taskflow_cache_refill_total";
pub(crate) const METRIC_CACHE_INDEX_HEALED: &str = "taskflow_cache_index_healed_total";
pub(crate) const METRIC_CACHE_REBUILD: &str = "taskflow_cache_rebuild_total";
pub(crate) const METRIC_LIST_MS: &str = "taskflow_list_ms";

#[derive(Clone)]
pub struct TaskQueryService {
    reader: Arc<dyn TaskReadRepo>,
    cache: CacheHandle,
}

impl TaskQueryService {
    pub fn new(reader: Arc<dyn TaskReadRepo>, cache: CacheHandle) -> Self {
        Self { reader, cache }
    }

    /// Reads through to the read store and warms the cache with the result.
    pub async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>, TaskServiceError> {
        let Some(task) = self.reader.find_task(id).await? else {
            return Ok(None);
        };
        self.cache.put_task(&task).await;
        Ok(Some(task))
    }

    /// Every task in the read store, ordered by creation time.
    pub async fn list_tasks(&self) -> Result<Vec<TaskRecord>, TaskServiceError> {
        let started = Instant::now();

        let ids = self.cache.index_members().await;
        let listed = if ids.is_empty() {
            None
        } else {
            self.list_from_index(&ids).await?
        };
        let mut tasks = match listed {
            Some(tasks) => tasks,
            None => self.rebuild_cache().await?,
        };
        tasks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        histogram!(METRIC_LIST_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(tasks)
    }

    /// Replace the index with the read store's full id set and rewrite every entry.
    ///
    /// A delete synced between the scan and the writes below can be re-listed until its
    /// entry expires; the next list then heals the index.
    pub async fn rebuild_cache(&self) -> Result<Vec<TaskRecord>, RepoError> {
        let tasks = self.reader.list_all_tasks().await?;
        let ids: Vec<String> = tasks.iter().map(|task| task.id.clone()).collect();

        self.cache.replace_index(&ids).await;
        for task in &tasks {
            self.cache.refresh(task).await;
        }

        counter!(METRIC_CACHE_REBUILD).increment(1);
        info!(
            target = "taskflow::queries",
            tasks = tasks.len(),
            "task cache rebuilt from read store"
        );
        Ok(tasks)
    }

    /// `None` when the index led nowhere and a rebuild is needed.
    async fn list_from_index(&self, ids: &[String]) -> Result<Option<Vec<TaskRecord>>, RepoError> {
        let BulkGet { mut hits, misses } = self.cache.bulk_get(ids).await;
        counter!(METRIC_CACHE_HIT).increment(hits.len() as u64);
        counter!(METRIC_CACHE_MISS).increment(misses.len() as u64);

        if !misses.is_empty() {
            let refilled = self.reader.find_tasks(&misses).await?;
            for task in &refilled {
                self.cache.refresh(task).await;
            }
            counter!(METRIC_CACHE_REFILL).increment(refilled.len() as u64);

            let found: HashSet<&str> = refilled.iter().map(|task| task.id.as_str()).collect();
            for id in misses.iter().filter(|id| !found.contains(id.as_str())) {
                self.cache.unlist(id).await;
                counter!(METRIC_CACHE_INDEX_HEALED).increment(1);
                debug!(
                    target = "taskflow::queries",
                    task_id = %id,
                    "dropped dangling index entry"
                );
            }

            hits.extend(refilled);
        }

        Ok((!hits.is_empty()).then_some(hits))
    }
}
