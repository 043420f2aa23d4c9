//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the chapter-feed REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the chapter-feed REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "chapter-feed REST API",
        version = "0.1.0",
        description = "Splits remote PDF documents into chapters and publishes them as RSS feeds",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6789", description = "Local development server")
    ),
    paths(
        // Tasks
        crate::api::routes::submit_task,
        crate::api::routes::get_task,
        crate::api::routes::task_feed,

        // Feeds
        crate::api::routes::rss_feed,
        crate::api::routes::pdf_chapter,

        // System
        crate::api::routes::health_check,
        crate::api::routes::queue_stats,
        crate::api::routes::event_stream,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::TaskId,
        crate::types::TaskState,
        crate::types::ChapterRecord,
        crate::types::QueueStats,
        crate::types::Event,
        crate::api::routes::SubmitRequest,
        crate::api::routes::TaskResponse,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "tasks", description = "Submission and status polling"),
        (name = "feeds", description = "RSS feeds and chapter sub-documents"),
        (name = "system", description = "Health, statistics and events"),
    )
)]
pub struct ApiDoc;
