//! Queue job kinds, one per change-event kind.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    SyncTaskCreated,
    SyncTaskUpdated,
    SyncTaskDeleted,
}

impl JobType {
    pub const ALL: [JobType; 3] = [
        JobType::SyncTaskCreated,
        JobType::SyncTaskUpdated,
        JobType::SyncTaskDeleted,
    ];

    /// Queue namespace shared by the publisher and the worker storage config.
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::SyncTaskCreated => "sync_task_created",
            JobType::SyncTaskUpdated => "sync_task_updated",
            JobType::SyncTaskDeleted => "sync_task_deleted",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "sync_task_created" => Ok(JobType::SyncTaskCreated),
            "sync_task_updated" => Ok(JobType::SyncTaskUpdated),
            "sync_task_deleted" => Ok(JobType::SyncTaskDeleted),
            _ => Err(()),
        }
    }
}
