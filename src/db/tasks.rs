//! Task record CRUD operations.

use crate::error::DatabaseError;
use crate::types::{TaskId, TaskState};
use crate::{Error, Result};

use super::{Database, TaskRow, TaskWrite};

impl Database {
    /// Insert or replace the record for a task
    ///
    /// `created_at` is kept from the first write.
    pub async fn upsert_task(&self, task: &TaskWrite<'_>) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let chapters_json = task.chapters.map(serde_json::to_string).transpose()?;

        let finished = matches!(task.state, TaskState::Completed | TaskState::Failed);

        // finished_seq orders finished rows for the stored-task cap
        sqlx::query(
            r#"
            INSERT INTO tasks (id, source_url, state, chapters_json, error, created_at, updated_at, finished_seq)
            VALUES (?, ?, ?, ?, ?, ?, ?,
                CASE WHEN ? THEN (SELECT COALESCE(MAX(finished_seq), 0) + 1 FROM tasks) END)
            ON CONFLICT(id) DO UPDATE SET
                source_url = excluded.source_url,
                state = excluded.state,
                chapters_json = excluded.chapters_json,
                error = excluded.error,
                updated_at = excluded.updated_at,
                finished_seq = excluded.finished_seq
            "#,
        )
        .bind(task.id.as_str())
        .bind(task.source_url)
        .bind(task.state.to_i32())
        .bind(chapters_json)
        .bind(task.error)
        .bind(now)
        .bind(now)
        .bind(finished)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert task: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: &TaskId) -> Result<Option<TaskRow>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, source_url, state, chapters_json, error, created_at, updated_at
            FROM tasks
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get task: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List tasks in a given state, oldest first
    pub async fn list_tasks_by_state(&self, state: TaskState) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, source_url, state, chapters_json, error, created_at, updated_at
            FROM tasks
            WHERE state = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(state.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list tasks: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Delete a task record, returning whether one existed
    pub async fn delete_task(&self, id: &TaskId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete task: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete finished task records beyond the retention bounds
    ///
    /// Keeps the `keep` most recently finished records and drops any finished
    /// before `finished_before` (Unix seconds). Processing records are never
    /// touched. Returns the identifiers that were removed.
    pub async fn prune_finished(
        &self,
        keep: usize,
        finished_before: Option<i64>,
    ) -> Result<Vec<TaskId>> {
        let completed = TaskState::Completed.to_i32();
        let failed = TaskState::Failed.to_i32();

        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            DELETE FROM tasks
            WHERE state IN (?, ?)
              AND (
                updated_at < ?
                OR id NOT IN (
                    SELECT id FROM tasks
                    WHERE state IN (?, ?)
                    ORDER BY finished_seq DESC
                    LIMIT ?
                )
              )
            RETURNING id
            "#,
        )
        .bind(completed)
        .bind(failed)
        .bind(finished_before.unwrap_or(i64::MIN))
        .bind(completed)
        .bind(failed)
        .bind(i64::try_from(keep).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to prune tasks: {}",
                e
            )))
        })?;

        ids.iter().map(|id| id.parse()).collect()
    }

    /// Number of task records in a given state
    pub async fn count_tasks_by_state(&self, state: TaskState) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE state = ?")
            .bind(state.to_i32())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count tasks: {}",
                    e
                )))
            })
    }
}
