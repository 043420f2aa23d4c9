//! Sub-document handler.

use super::{ChapterQuery, required};
use crate::api::AppState;
use crate::error::Result;
use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// GET /pdf-chapter - Pages `start_page..=end_page` of a cached document
///
/// The sub-document is produced once per (file, range) and served from disk
/// afterwards.
#[utoipa::path(
    get,
    path = "/pdf-chapter",
    tag = "feeds",
    params(ChapterQuery),
    responses(
        (status = 200, description = "PDF containing exactly the requested pages", content_type = "application/pdf"),
        (status = 400, description = "Missing parameter, bad file name or page range", body = crate::error::ApiError),
        (status = 404, description = "Document not in cache", body = crate::error::ApiError),
        (status = 422, description = "Document could not be parsed", body = crate::error::ApiError)
    )
)]
pub async fn pdf_chapter(
    State(state): State<AppState>,
    Query(query): Query<ChapterQuery>,
) -> Result<Response> {
    let file = required(query.file, "file")?;
    let start = required(query.start_page, "start_page")?;
    let end = required(query.end_page, "end_page")?;

    let path = state.service.chapter_document(&file, start, end).await?;
    let bytes = tokio::fs::read(&path).await?;

    let disposition = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => format!("inline; filename=\"{name}\""),
        None => "inline".to_string(),
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
