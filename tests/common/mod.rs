#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use taskflow::application::commands::TaskCommandService;
use taskflow::application::queries::TaskQueryService;
use taskflow::application::repos::{
    CreateTaskParams, JobsRepo, NewJobRecord, RepoError, TaskReadRepo, TaskWriteRepo,
    UpsertOutcome,
};
use taskflow::application::sync::{ReadModelSynchronizer, SyncOutcome};
use taskflow::cache::{BulkGet, CacheError, CacheHandle, MemoryTaskCache, TaskCache};
use taskflow::domain::entities::TaskRecord;
use taskflow::domain::events::ChangeEvent;
use taskflow::domain::tasks::TaskPatch;
use taskflow::domain::types::JobType;

pub const TTL: Duration = Duration::from_secs(60);

#[derive(Default)]
pub struct InMemoryWriteStore {
    rows: Mutex<HashMap<String, TaskRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryWriteStore {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn get(&self, id: &str) -> Option<TaskRecord> {
        self.rows.lock().await.get(id).cloned()
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("write store unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskWriteRepo for InMemoryWriteStore {
    async fn insert_task(&self, params: CreateTaskParams) -> Result<TaskRecord, RepoError> {
        self.check()?;
        let now = OffsetDateTime::now_utc();
        let task = TaskRecord {
            id: params.id,
            title: params.title,
            description: params.description,
            is_completed: params.is_completed,
            created_at: now,
            updated_at: now,
        };
        self.rows
            .lock()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update_task_fields(
        &self,
        id: &str,
        patch: &TaskPatch,
    ) -> Result<Option<TaskRecord>, RepoError> {
        self.check()?;
        let mut rows = self.rows.lock().await;
        let Some(task) = rows.get_mut(id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title.as_ref() {
            task.title = title.clone();
        }
        if let Some(description) = patch.description.as_ref() {
            task.description = description.clone();
        }
        if let Some(is_completed) = patch.is_completed {
            task.is_completed = is_completed;
        }
        let floor = task.updated_at + time::Duration::microseconds(1);
        task.updated_at = OffsetDateTime::now_utc().max(floor);
        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: &str) -> Result<Option<OffsetDateTime>, RepoError> {
        self.check()?;
        Ok(self.rows.lock().await.remove(id).map(|task| {
            let floor = task.updated_at + time::Duration::microseconds(1);
            OffsetDateTime::now_utc().max(floor)
        }))
    }
}

/// Read store that counts how many ids each lookup asks for. Deleted ids keep a
/// tombstone time, and snapshots not later than it are rejected.
#[derive(Default)]
pub struct InMemoryReadStore {
    rows: Mutex<HashMap<String, TaskRecord>>,
    tombstones: Mutex<HashMap<String, OffsetDateTime>>,
    unavailable: AtomicBool,
    point_lookups: AtomicUsize,
    ids_fetched: AtomicUsize,
    scans: AtomicUsize,
}

impl InMemoryReadStore {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn insert_raw(&self, task: TaskRecord) {
        self.rows.lock().await.insert(task.id.clone(), task);
    }

    pub async fn remove_raw(&self, id: &str) {
        self.rows.lock().await.remove(id);
    }

    pub async fn get(&self, id: &str) -> Option<TaskRecord> {
        self.rows.lock().await.get(id).cloned()
    }

    pub async fn tombstone(&self, id: &str) -> Option<OffsetDateTime> {
        self.tombstones.lock().await.get(id).copied()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub fn ids_fetched(&self) -> usize {
        self.ids_fetched.load(Ordering::SeqCst)
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.point_lookups.store(0, Ordering::SeqCst);
        self.ids_fetched.store(0, Ordering::SeqCst);
        self.scans.store(0, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }
}

#[async_trait]
impl TaskReadRepo for InMemoryReadStore {
    async fn find_task(&self, id: &str) -> Result<Option<TaskRecord>, RepoError> {
        self.check()?;
        self.point_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().await.get(id).cloned())
    }

    async fn find_tasks(&self, ids: &[String]) -> Result<Vec<TaskRecord>, RepoError> {
        self.check()?;
        self.ids_fetched.fetch_add(ids.len(), Ordering::SeqCst);
        let rows = self.rows.lock().await;
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    async fn list_all_tasks(&self) -> Result<Vec<TaskRecord>, RepoError> {
        self.check()?;
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().await.values().cloned().collect())
    }

    async fn upsert_task(&self, task: &TaskRecord) -> Result<UpsertOutcome, RepoError> {
        self.check()?;
        let mut rows = self.rows.lock().await;
        let mut tombstones = self.tombstones.lock().await;
        if let Some(deleted_at) = tombstones.get(&task.id) {
            if *deleted_at >= task.updated_at {
                return Ok(UpsertOutcome::Stale);
            }
        }
        if let Some(existing) = rows.get(&task.id) {
            if existing.updated_at > task.updated_at {
                return Ok(UpsertOutcome::Stale);
            }
        }
        tombstones.remove(&task.id);
        rows.insert(task.id.clone(), task.clone());
        Ok(UpsertOutcome::Applied)
    }

    async fn remove_task(
        &self,
        id: &str,
        deleted_at: OffsetDateTime,
    ) -> Result<bool, RepoError> {
        self.check()?;
        let mut rows = self.rows.lock().await;
        let mut tombstones = self.tombstones.lock().await;
        if let Some(existing) = rows.get(id) {
            if existing.updated_at > deleted_at {
                return Ok(false);
            }
        }
        let tombstone = tombstones.entry(id.to_string()).or_insert(deleted_at);
        if *tombstone < deleted_at {
            *tombstone = deleted_at;
        }
        Ok(rows.remove(id).is_some())
    }
}

/// Queue double that keeps every published job for manual delivery.
#[derive(Default)]
pub struct CapturingJobs {
    jobs: Mutex<Vec<NewJobRecord>>,
    unavailable: AtomicBool,
}

impl CapturingJobs {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn records(&self) -> Vec<NewJobRecord> {
        self.jobs.lock().await.clone()
    }

    pub async fn events(&self) -> Vec<ChangeEvent> {
        self.jobs
            .lock()
            .await
            .iter()
            .map(|job| serde_json::from_value(job.payload.clone()).expect("event payload"))
            .collect()
    }

    pub async fn take_events(&self) -> Vec<ChangeEvent> {
        let drained: Vec<NewJobRecord> = self.jobs.lock().await.drain(..).collect();
        drained
            .into_iter()
            .map(|job| serde_json::from_value(job.payload).expect("event payload"))
            .collect()
    }

    pub async fn job_types(&self) -> Vec<JobType> {
        self.jobs.lock().await.iter().map(|job| job.job_type).collect()
    }
}

#[async_trait]
impl JobsRepo for CapturingJobs {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("queue unreachable"));
        }
        let mut jobs = self.jobs.lock().await;
        jobs.push(job);
        Ok(format!("job-{}", jobs.len()))
    }
}

/// Cache backend whose every call fails.
pub struct DownCache;

#[async_trait]
impl TaskCache for DownCache {
    async fn set(&self, _task: &TaskRecord, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn delete(&self, _id: &str) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn bulk_get(&self, _ids: &[String]) -> Result<BulkGet, CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn index_add(&self, _id: &str) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn index_remove(&self, _id: &str) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn index_members(&self) -> Result<Vec<String>, CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn index_replace(&self, _ids: &[String]) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }
}

pub struct Harness {
    pub write: Arc<InMemoryWriteStore>,
    pub read: Arc<InMemoryReadStore>,
    pub jobs: Arc<CapturingJobs>,
    pub cache: Arc<MemoryTaskCache>,
    pub commands: Arc<TaskCommandService>,
    pub queries: Arc<TaskQueryService>,
    pub synchronizer: Arc<ReadModelSynchronizer>,
}

impl Harness {
    pub fn new() -> Self {
        let cache = Arc::new(MemoryTaskCache::new());
        Self::with_cache_handle(cache.clone(), CacheHandle::new(cache, TTL))
    }

    /// Services wired to a cache that rejects every call.
    pub fn with_broken_cache() -> Self {
        Self::with_cache_handle(
            Arc::new(MemoryTaskCache::new()),
            CacheHandle::new(Arc::new(DownCache), TTL),
        )
    }

    fn with_cache_handle(cache: Arc<MemoryTaskCache>, handle: CacheHandle) -> Self {
        let write = Arc::new(InMemoryWriteStore::default());
        let read = Arc::new(InMemoryReadStore::default());
        let jobs = Arc::new(CapturingJobs::default());

        let writer: Arc<dyn TaskWriteRepo> = write.clone();
        let reader: Arc<dyn TaskReadRepo> = read.clone();
        let queue: Arc<dyn JobsRepo> = jobs.clone();

        Self {
            commands: Arc::new(TaskCommandService::new(writer, queue)),
            queries: Arc::new(TaskQueryService::new(reader.clone(), handle.clone())),
            synchronizer: Arc::new(ReadModelSynchronizer::new(reader, handle)),
            write,
            read,
            jobs,
            cache,
        }
    }

    /// Deliver every pending event once, in publish order.
    pub async fn deliver_all(&self) -> Vec<SyncOutcome> {
        let mut outcomes = Vec::new();
        for event in self.jobs.take_events().await {
            outcomes.push(self.synchronizer.apply(&event).await.expect("sync"));
        }
        outcomes
    }

    pub async fn index(&self) -> Vec<String> {
        let mut members = self.cache.index_members().await.expect("memory index");
        members.sort();
        members
    }
}

pub fn task(id: &str, title: &str, updated_at: OffsetDateTime) -> TaskRecord {
    TaskRecord {
        id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        is_completed: false,
        created_at: updated_at,
        updated_at,
    }
}
