//! Write side: validates input, commits to the authoritative store, then publishes.

use std::sync::Arc;

use metrics::counter;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    application::{
        error::TaskServiceError,
        jobs::publish_change_event,
        repos::{CreateTaskParams, JobsRepo, TaskWriteRepo},
    },
    domain::{
        entities::TaskRecord,
        events::ChangeEvent,
        tasks::{NewTask, TaskPatch},
    },
};

pub(crate) const METRIC_PUBLISH_FAILED: &str = "taskflow_publish_failed_total";

#[derive(Clone)]
pub struct TaskCommandService {
    writer: Arc<dyn TaskWriteRepo>,
    jobs: Arc<dyn JobsRepo>,
}

impl TaskCommandService {
    pub fn new(writer: Arc<dyn TaskWriteRepo>, jobs: Arc<dyn JobsRepo>) -> Self {
        Self { writer, jobs }
    }

    pub async fn create_task(&self, command: NewTask) -> Result<TaskRecord, TaskServiceError> {
        let NewTask {
            title,
            description,
            is_completed,
        } = command.validated()?;

        let task = self
            .writer
            .insert_task(CreateTaskParams {
                id: Uuid::new_v4().to_string(),
                title,
                description,
                is_completed,
            })
            .await?;

        info!(
            target = "taskflow::commands",
            task_id = %task.id,
            "task created"
        );
        self.publish(ChangeEvent::Created { task: task.clone() })
            .await;
        Ok(task)
    }

    /// `Ok(None)` when no task has this id; nothing is published then.
    pub async fn update_task(
        &self,
        id: &str,
        patch: TaskPatch,
    ) -> Result<Option<TaskRecord>, TaskServiceError> {
        let patch = patch.validated()?;
        let Some(task) = self.writer.update_task_fields(id, &patch).await? else {
            return Ok(None);
        };

        info!(
            target = "taskflow::commands",
            task_id = %task.id,
            "task updated"
        );
        self.publish(ChangeEvent::Updated { task: task.clone() })
            .await;
        Ok(Some(task))
    }

    /// `Ok(false)` when no task has this id; nothing is published then.
    pub async fn delete_task(&self, id: &str) -> Result<bool, TaskServiceError> {
        let Some(deleted_at) = self.writer.delete_task(id).await? else {
            return Ok(false);
        };

        info!(target = "taskflow::commands", task_id = id, "task deleted");
        self.publish(ChangeEvent::Deleted {
            id: id.to_string(),
            deleted_at,
        })
        .await;
        Ok(true)
    }

    /// The commit already happened, so a failed publish is recorded and swallowed.
    async fn publish(&self, event: ChangeEvent) {
        match publish_change_event(self.jobs.as_ref(), &event).await {
            Ok(job_id) => info!(
                target = "taskflow::commands",
                task_id = event.task_id(),
                kind = event.kind(),
                job_id = %job_id,
                "change event published"
            ),
            Err(err) => {
                counter!(METRIC_PUBLISH_FAILED, "kind" => event.kind()).increment(1);
                error!(
                    target = "taskflow::commands",
                    task_id = event.task_id(),
                    kind = event.kind(),
                    error = %err,
                    "change event lost; read model will not see this commit"
                );
            }
        }
    }
}
