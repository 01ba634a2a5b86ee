use apalis::prelude::{Data, Error as ApalisError};

use crate::domain::{error::DomainError, events::ChangeEvent, types::JobType};

use super::context::{SyncWorkerContext, job_failed};

pub async fn process_task_created_job(
    event: ChangeEvent,
    context: Data<SyncWorkerContext>,
) -> Result<(), ApalisError> {
    process_event(JobType::SyncTaskCreated, event, &context).await
}

pub async fn process_task_updated_job(
    event: ChangeEvent,
    context: Data<SyncWorkerContext>,
) -> Result<(), ApalisError> {
    process_event(JobType::SyncTaskUpdated, event, &context).await
}

pub async fn process_task_deleted_job(
    event: ChangeEvent,
    context: Data<SyncWorkerContext>,
) -> Result<(), ApalisError> {
    process_event(JobType::SyncTaskDeleted, event, &context).await
}

async fn process_event(
    expected: JobType,
    event: ChangeEvent,
    ctx: &SyncWorkerContext,
) -> Result<(), ApalisError> {
    if event.job_type() != expected {
        return Err(job_failed(DomainError::invariant(format!(
            "`{}` event for task `{}` delivered to the `{}` queue",
            event.kind(),
            event.task_id(),
            expected.as_str()
        ))));
    }

    ctx.synchronizer
        .apply(&event)
        .await
        .map(|_| ())
        .map_err(job_failed)
}
