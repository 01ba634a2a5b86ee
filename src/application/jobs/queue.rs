use time::OffsetDateTime;

use crate::{
    application::repos::{JobsRepo, NewJobRecord, RepoError},
    domain::{events::ChangeEvent, types::JobType},
};

/// A failed synchronizer event is never re-delivered.
pub const SYNC_JOB_MAX_ATTEMPTS: i32 = 1;
const SYNC_JOB_PRIORITY: i32 = 0;

/// Enqueue a job with the provided payload, returning the id assigned by the queue.
pub async fn enqueue_job<J, P>(
    repo: &J,
    job_type: JobType,
    payload: &P,
    run_at: Option<OffsetDateTime>,
    max_attempts: i32,
    priority: i32,
) -> Result<String, RepoError>
where
    J: JobsRepo + ?Sized,
    P: serde::Serialize,
{
    let payload = serde_json::to_value(payload)
        .map_err(|err| RepoError::from_persistence(err.to_string()))?;
    let record = NewJobRecord {
        job_type,
        payload,
        run_at: run_at.unwrap_or_else(OffsetDateTime::now_utc),
        max_attempts,
        priority,
    };

    repo.enqueue_job(record).await
}

/// Publish a change event onto the queue of its kind.
pub async fn publish_change_event<J: JobsRepo + ?Sized>(
    repo: &J,
    event: &ChangeEvent,
) -> Result<String, RepoError> {
    enqueue_job(
        repo,
        event.job_type(),
        event,
        None,
        SYNC_JOB_MAX_ATTEMPTS,
        SYNC_JOB_PRIORITY,
    )
    .await
}
