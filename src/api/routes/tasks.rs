//! Submission and status handlers.

use super::{SubmitRequest, required, task_response};
use crate::api::AppState;
use crate::error::Result;
use crate::types::TaskId;
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};

/// POST /tasks - Submit a source document
#[utoipa::path(
    post,
    path = "/tasks",
    tag = "tasks",
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Task already completed (chapters included)", body = super::TaskResponse),
        (status = 202, description = "Processing started or already underway", body = super::TaskResponse),
        (status = 400, description = "Missing or invalid URL", body = crate::error::ApiError),
        (status = 503, description = "Queue full or shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_task(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Response> {
    let url = required(request.url, "url")?;
    let status = state.service.submit(&url).await?;
    Ok(task_response(status))
}

/// GET /tasks/:id - Poll task status
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task identifier (32 hex characters)")
    ),
    responses(
        (status = 200, description = "Task is unknown, completed or failed", body = super::TaskResponse),
        (status = 202, description = "Task is processing", body = super::TaskResponse),
        (status = 400, description = "Malformed task identifier", body = crate::error::ApiError)
    )
)]
pub async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let id: TaskId = id.parse()?;
    let status = state.service.status(&id).await?;
    Ok(task_response(status))
}
