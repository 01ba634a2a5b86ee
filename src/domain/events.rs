//! Change events emitted after every authoritative commit.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::entities::TaskRecord;
use super::types::JobType;

/// A committed mutation, delivered at least once and in no particular order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    Created { task: TaskRecord },
    Updated { task: TaskRecord },
    /// `deleted_at` is later than every `updated_at` the task ever had.
    Deleted {
        id: String,
        #[serde(with = "time::serde::rfc3339")]
        deleted_at: OffsetDateTime,
    },
}

impl ChangeEvent {
    pub fn task_id(&self) -> &str {
        match self {
            ChangeEvent::Created { task } | ChangeEvent::Updated { task } => &task.id,
            ChangeEvent::Deleted { id, .. } => id,
        }
    }

    pub fn job_type(&self) -> JobType {
        match self {
            ChangeEvent::Created { .. } => JobType::SyncTaskCreated,
            ChangeEvent::Updated { .. } => JobType::SyncTaskUpdated,
            ChangeEvent::Deleted { .. } => JobType::SyncTaskDeleted,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Created { .. } => "created",
            ChangeEvent::Updated { .. } => "updated",
            ChangeEvent::Deleted { .. } => "deleted",
        }
    }
}
