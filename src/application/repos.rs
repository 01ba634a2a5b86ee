//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::TaskRecord;
use crate::domain::tasks::TaskPatch;
use crate::domain::types::JobType;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Store connectivity or capacity failure, as opposed to a rejected request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RepoError::Persistence(_) | RepoError::Timeout)
    }
}

#[derive(Debug, Clone)]
pub struct CreateTaskParams {
    pub id: String,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
}

/// Outcome of a last-write-wins upsert into the read store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The row was inserted or replaced.
    Applied,
    /// The stored row or the tombstone is newer; nothing was written.
    Stale,
}

/// Authoritative store. Each call is one single-row transaction.
#[async_trait]
pub trait TaskWriteRepo: Send + Sync {
    async fn insert_task(&self, params: CreateTaskParams) -> Result<TaskRecord, RepoError>;

    /// Apply the supplied fields and advance `updated_at`. `None` when the id is absent.
    async fn update_task_fields(
        &self,
        id: &str,
        patch: &TaskPatch,
    ) -> Result<Option<TaskRecord>, RepoError>;

    /// Delete time of the removed row, later than its last `updated_at`. `None` when
    /// the id is absent.
    async fn delete_task(&self, id: &str) -> Result<Option<OffsetDateTime>, RepoError>;
}

/// Derived, eventually-consistent read store.
#[async_trait]
pub trait TaskReadRepo: Send + Sync {
    async fn find_task(&self, id: &str) -> Result<Option<TaskRecord>, RepoError>;

    /// Tasks found among `ids`; absent ids are simply not returned.
    async fn find_tasks(&self, ids: &[String]) -> Result<Vec<TaskRecord>, RepoError>;

    async fn list_all_tasks(&self) -> Result<Vec<TaskRecord>, RepoError>;

    /// Create-or-replace by id unless the stored row is newer than `task` or a
    /// tombstone at or after `task.updated_at` exists.
    async fn upsert_task(&self, task: &TaskRecord) -> Result<UpsertOutcome, RepoError>;

    /// Record a tombstone at `deleted_at` and drop the row. Returns false when nothing
    /// was stored under `id`.
    async fn remove_task(
        &self,
        id: &str,
        deleted_at: OffsetDateTime,
    ) -> Result<bool, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

/// Durable queue the change events travel through.
#[async_trait]
pub trait JobsRepo: Send + Sync {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;
}
