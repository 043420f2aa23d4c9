//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`tasks`] - Submission and status polling
//! - [`feed`] - RSS feeds
//! - [`chapters`] - Page-range sub-documents
//! - [`system`] - Health, statistics, events, OpenAPI

use crate::types::{ChapterRecord, TaskId, TaskState, TaskStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

mod chapters;
mod feed;
mod system;
mod tasks;

// Re-export all handlers so `routes::function_name` continues to work
pub use chapters::*;
pub use feed::*;
pub use system::*;
pub use tasks::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /tasks
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitRequest {
    /// Source document URL (http or https)
    pub url: Option<String>,
}

/// Query parameters for GET /rss
#[derive(Debug, Deserialize, Serialize, utoipa::IntoParams)]
pub struct FeedQuery {
    /// Source document URL (http or https)
    pub url: Option<String>,
}

/// Query parameters for GET /pdf-chapter
#[derive(Debug, Deserialize, Serialize, utoipa::IntoParams)]
pub struct ChapterQuery {
    /// Cached document file name, as used in feed links
    pub file: Option<String>,
    /// First page, 0-indexed
    pub start_page: Option<i64>,
    /// Last page, 0-indexed and inclusive
    pub end_page: Option<i64>,
}

/// Task status as returned by submission and polling endpoints
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TaskResponse {
    /// Task identifier
    pub task_id: TaskId,
    /// Current state
    pub status: TaskState,
    /// Chapter records, present once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Vec<ChapterRecord>>,
    /// Failure message, present once failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TaskStatus> for TaskResponse {
    fn from(status: TaskStatus) -> Self {
        Self {
            task_id: status.task_id,
            status: status.state,
            chapters: status.chapters,
            error: status.error,
        }
    }
}

/// 202 while a task is processing, 200 otherwise
pub(crate) fn task_response(status: TaskStatus) -> Response {
    let code = match status.state {
        TaskState::Processing => StatusCode::ACCEPTED,
        _ => StatusCode::OK,
    };
    (code, Json(TaskResponse::from(status))).into_response()
}

/// Require a query or body parameter
pub(crate) fn required<T>(value: Option<T>, name: &str) -> crate::Result<T> {
    value.ok_or_else(|| crate::Error::MissingParameter(name.to_string()))
}
