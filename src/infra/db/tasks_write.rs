use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{CreateTaskParams, RepoError, TaskWriteRepo};
use crate::domain::entities::TaskRecord;
use crate::domain::tasks::TaskPatch;

use super::WriteRepositories;
use super::types::TaskRow;
use super::util::map_sqlx_error;

#[async_trait]
impl TaskWriteRepo for WriteRepositories {
    async fn insert_task(&self, params: CreateTaskParams) -> Result<TaskRecord, RepoError> {
        let CreateTaskParams {
            id,
            title,
            description,
            is_completed,
        } = params;

        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            INSERT INTO tasks (id, title, description, is_completed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, clock_timestamp(), clock_timestamp())
            RETURNING id, title, description, is_completed, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(is_completed)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_task_fields(
        &self,
        id: &str,
        patch: &TaskPatch,
    ) -> Result<Option<TaskRecord>, RepoError> {
        // `updated_at` strictly increases per row even if the clock stalls or steps back.
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            UPDATE tasks
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   is_completed = COALESCE($4, is_completed),
                   updated_at = GREATEST(clock_timestamp(), updated_at + interval '1 microsecond')
             WHERE id = $1
            RETURNING id, title, description, is_completed, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.is_completed)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn delete_task(&self, id: &str) -> Result<Option<OffsetDateTime>, RepoError> {
        // Same floor as updates, so the tombstone outranks every snapshot of the row.
        sqlx::query_scalar::<_, OffsetDateTime>(
            r#"
            DELETE FROM tasks
             WHERE id = $1
            RETURNING GREATEST(clock_timestamp(), updated_at + interval '1 microsecond')
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
