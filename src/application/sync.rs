//! Applies change events to the read model and keeps the task cache in step.

use std::sync::Arc;

use metrics::counter;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::{
    application::repos::{RepoError, TaskReadRepo, UpsertOutcome},
    cache::CacheHandle,
    domain::{entities::TaskRecord, events::ChangeEvent},
};

pub(crate) const METRIC_SYNC_APPLIED: &str = "taskflow_sync_applied_total";
pub(crate) const METRIC_SYNC_STALE: &str = "taskflow_sync_stale_total";
pub(crate) const METRIC_SYNC_FAILED: &str = "taskflow_sync_failed_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The read row now carries the event's snapshot.
    Applied,
    /// The read row or its tombstone was already newer; read store and cache untouched.
    Stale,
    /// The read row was deleted.
    Removed,
    /// Nothing to delete. Cache cleanup still ran.
    AlreadyAbsent,
}

impl SyncOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncOutcome::Applied => "applied",
            SyncOutcome::Stale => "stale",
            SyncOutcome::Removed => "removed",
            SyncOutcome::AlreadyAbsent => "already_absent",
        }
    }
}

pub struct ReadModelSynchronizer {
    reader: Arc<dyn TaskReadRepo>,
    cache: CacheHandle,
}

impl ReadModelSynchronizer {
    pub fn new(reader: Arc<dyn TaskReadRepo>, cache: CacheHandle) -> Self {
        Self { reader, cache }
    }

    /// Apply one event. Safe to call repeatedly with the same event.
    pub async fn apply(&self, event: &ChangeEvent) -> Result<SyncOutcome, RepoError> {
        let result = match event {
            ChangeEvent::Created { task } | ChangeEvent::Updated { task } => {
                self.apply_snapshot(task).await
            }
            ChangeEvent::Deleted { id, deleted_at } => self.apply_delete(id, *deleted_at).await,
        };

        let kind = event.kind();
        match &result {
            Ok(SyncOutcome::Stale) => {
                counter!(METRIC_SYNC_STALE, "kind" => kind).increment(1);
                info!(
                    target = "taskflow::sync",
                    task_id = event.task_id(),
                    kind,
                    "skipped stale change event"
                );
            }
            Ok(outcome) => {
                counter!(METRIC_SYNC_APPLIED, "kind" => kind).increment(1);
                info!(
                    target = "taskflow::sync",
                    task_id = event.task_id(),
                    kind,
                    outcome = outcome.as_str(),
                    "applied change event"
                );
            }
            Err(err) => {
                counter!(METRIC_SYNC_FAILED, "kind" => kind).increment(1);
                error!(
                    target = "taskflow::sync",
                    task_id = event.task_id(),
                    kind,
                    error = %err,
                    "failed to apply change event"
                );
            }
        }

        result
    }

    async fn apply_snapshot(&self, task: &TaskRecord) -> Result<SyncOutcome, RepoError> {
        match self.reader.upsert_task(task).await? {
            UpsertOutcome::Applied => {
                self.cache.put_task(task).await;
                Ok(SyncOutcome::Applied)
            }
            UpsertOutcome::Stale => Ok(SyncOutcome::Stale),
        }
    }

    async fn apply_delete(
        &self,
        id: &str,
        deleted_at: OffsetDateTime,
    ) -> Result<SyncOutcome, RepoError> {
        let removed = self.reader.remove_task(id, deleted_at).await?;
        self.cache.forget_task(id).await;
        Ok(if removed {
            SyncOutcome::Removed
        } else {
            SyncOutcome::AlreadyAbsent
        })
    }
}
