//! RSS feed handlers.

use super::{FeedQuery, required, task_response};
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::feed::RSS_CONTENT_TYPE;
use crate::types::{TaskId, TaskState, TaskStatus};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

fn feed_response(state: &AppState, headers: &HeaderMap, status: &TaskStatus) -> Result<Response> {
    let xml = state.service.feed_xml(status, &state.base_url(headers))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, RSS_CONTENT_TYPE)],
        xml,
    )
        .into_response())
}

/// GET /rss?url= - Submit a source and return its feed once complete
///
/// The first request starts processing and answers 202; repeat the request
/// (or poll `/tasks/{id}`) until the feed is returned.
#[utoipa::path(
    get,
    path = "/rss",
    tag = "feeds",
    params(FeedQuery),
    responses(
        (status = 200, description = "RSS 2.0 feed of the document's chapters", content_type = "application/rss+xml"),
        (status = 202, description = "Processing started or underway", body = super::TaskResponse),
        (status = 400, description = "Missing or invalid URL", body = crate::error::ApiError),
        (status = 503, description = "Queue full or shutting down", body = crate::error::ApiError)
    )
)]
pub async fn rss_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<FeedQuery>,
) -> Result<Response> {
    let url = required(query.url, "url")?;
    let status = state.service.submit(&url).await?;

    match status.state {
        TaskState::Completed => feed_response(&state, &headers, &status),
        _ => Ok(task_response(status)),
    }
}

/// GET /tasks/:id/rss - Feed of a completed task
#[utoipa::path(
    get,
    path = "/tasks/{id}/rss",
    tag = "feeds",
    params(
        ("id" = String, Path, description = "Task identifier (32 hex characters)")
    ),
    responses(
        (status = 200, description = "RSS 2.0 feed of the document's chapters", content_type = "application/rss+xml"),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
        (status = 409, description = "Task has not completed", body = crate::error::ApiError)
    )
)]
pub async fn task_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response> {
    let id: TaskId = id.parse()?;
    let status = state.service.status(&id).await?;

    if status.state == TaskState::Unknown {
        return Err(Error::TaskNotFound(id.to_string()));
    }
    feed_response(&state, &headers, &status)
}
