//! Database layer for chapter-feed
//!
//! Handles SQLite persistence of task records so completed chapter lists
//! survive restarts and interrupted jobs can be re-queued.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`tasks`] - Task record CRUD

use crate::types::{ChapterRecord, TaskId, TaskState, TaskStatus};
use crate::Result;
use chrono::{TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod tasks;

/// Task record to be written to the database
#[derive(Debug, Clone)]
pub struct TaskWrite<'a> {
    /// Task identifier
    pub id: &'a TaskId,
    /// Source URL the task was submitted with
    pub source_url: &'a str,
    /// Lifecycle state
    pub state: TaskState,
    /// Chapter list, for completed tasks
    pub chapters: Option<&'a [ChapterRecord]>,
    /// Failure message, for failed tasks
    pub error: Option<&'a str>,
}

/// Task record from database
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    /// Task identifier (MD5 hex of the source URL)
    pub id: String,
    /// Source URL
    pub source_url: String,
    /// State code (see [`TaskState::from_i32`])
    pub state: i32,
    /// Chapter list as JSON, set once completed
    pub chapters_json: Option<String>,
    /// Failure message
    pub error: Option<String>,
    /// Unix timestamp when the task was first recorded
    pub created_at: i64,
    /// Unix timestamp of the last state change
    pub updated_at: i64,
}

impl TaskRow {
    /// Decoded lifecycle state
    pub fn task_state(&self) -> TaskState {
        TaskState::from_i32(self.state)
    }

    /// Decode the stored chapter list
    pub fn chapters(&self) -> Result<Option<Vec<ChapterRecord>>> {
        self.chapters_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(Into::into)
    }

    /// Convert into the status snapshot served to clients
    pub fn into_status(self) -> Result<TaskStatus> {
        let chapters = self.chapters()?;
        let id: TaskId = self.id.parse()?;

        Ok(TaskStatus {
            task_id: id,
            state: TaskState::from_i32(self.state),
            source_url: Some(self.source_url),
            chapters,
            error: self.error,
            updated_at: Utc.timestamp_opt(self.updated_at, 0).single(),
        })
    }
}

/// Database handle for chapter-feed
pub struct Database {
    pool: SqlitePool,
}
