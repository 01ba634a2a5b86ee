mod context;
mod queue;
mod sync;

pub use context::{SyncWorkerContext, job_failed};
pub use queue::{SYNC_JOB_MAX_ATTEMPTS, enqueue_job, publish_change_event};
pub use sync::{process_task_created_job, process_task_deleted_job, process_task_updated_job};
