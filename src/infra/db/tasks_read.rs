use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{RepoError, TaskReadRepo, UpsertOutcome};
use crate::domain::entities::TaskRecord;

use super::ReadRepositories;
use super::types::TaskRow;
use super::util::map_sqlx_error;

// Deleted tasks stay behind as tombstone rows (`deleted_at` set, `updated_at` equal to
// the delete time). Every read filters them out.
#[async_trait]
impl TaskReadRepo for ReadRepositories {
    async fn find_task(&self, id: &str) -> Result<Option<TaskRecord>, RepoError> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, title, description, is_completed, created_at, updated_at
              FROM tasks
             WHERE id = $1
               AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn find_tasks(&self, ids: &[String]) -> Result<Vec<TaskRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, title, description, is_completed, created_at, updated_at
              FROM tasks
             WHERE id = ANY($1)
               AND deleted_at IS NULL
            "#,
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_all_tasks(&self) -> Result<Vec<TaskRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, title, description, is_completed, created_at, updated_at
              FROM tasks
             WHERE deleted_at IS NULL
             ORDER BY created_at, id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upsert_task(&self, task: &TaskRecord) -> Result<UpsertOutcome, RepoError> {
        // A snapshot equal in time to a live row is re-applied; equal to a tombstone it is not.
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (id, title, description, is_completed, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, NULL)
            ON CONFLICT (id) DO UPDATE
               SET title = EXCLUDED.title,
                   description = EXCLUDED.description,
                   is_completed = EXCLUDED.is_completed,
                   created_at = EXCLUDED.created_at,
                   updated_at = EXCLUDED.updated_at,
                   deleted_at = NULL
             WHERE tasks.updated_at < EXCLUDED.updated_at
                OR (tasks.updated_at = EXCLUDED.updated_at AND tasks.deleted_at IS NULL)
            "#,
        )
        .bind(&task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.is_completed)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(if result.rows_affected() > 0 {
            UpsertOutcome::Applied
        } else {
            UpsertOutcome::Stale
        })
    }

    async fn remove_task(
        &self,
        id: &str,
        deleted_at: OffsetDateTime,
    ) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            WITH prior AS (
                SELECT deleted_at IS NULL AS live
                  FROM tasks
                 WHERE id = $1
            ),
            tombstone AS (
                INSERT INTO tasks (id, title, description, is_completed, created_at, updated_at, deleted_at)
                VALUES ($1, '', '', FALSE, $2, $2, $2)
                ON CONFLICT (id) DO UPDATE
                   SET updated_at = EXCLUDED.updated_at,
                       deleted_at = EXCLUDED.deleted_at
                 WHERE tasks.updated_at <= EXCLUDED.updated_at
                RETURNING id
            )
            SELECT COALESCE((SELECT live FROM prior), FALSE)
               AND EXISTS (SELECT 1 FROM tombstone)
            "#,
        )
        .bind(id)
        .bind(deleted_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
