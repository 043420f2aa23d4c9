//! Error types for chapter-feed
//!
//! This module provides the error taxonomy for the library, including:
//! - Request validation errors (missing or malformed parameters)
//! - Collaborator failures (fetching, document parsing, summarization)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for chapter-feed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chapter-feed
///
/// Each variant carries enough context to build a useful API response.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "workers.max_concurrent_jobs")
        key: Option<String>,
    },

    /// A required request parameter was not supplied
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// A request parameter was supplied but could not be used
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter
        name: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Page range does not fit inside the referenced document
    #[error("invalid page range {start}..={end} for document with {page_count} pages")]
    InvalidPageRange {
        /// Requested first page (0-indexed)
        start: i64,
        /// Requested last page (0-indexed, inclusive)
        end: i64,
        /// Number of pages in the document
        page_count: usize,
    },

    /// Referenced stored document does not exist
    #[error("source document not found: {0}")]
    SourceNotFound(String),

    /// No task is known under this identifier
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The task exists but has no result to render yet
    #[error("task {id} is not ready (state: {state})")]
    TaskNotReady {
        /// Task identifier
        id: String,
        /// Current state of the task
        state: String,
    },

    /// The job queue is at capacity
    #[error("job queue is full ({capacity} pending jobs)")]
    QueueFull {
        /// Configured queue capacity
        capacity: usize,
    },

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Document could not be parsed or manipulated
    #[error("document error: {0}")]
    Document(String),

    /// Summarization backend failed
    #[error("summarizer error: {0}")]
    Summarize(String),

    /// Remote source answered with a non-success status
    #[error("fetching {url} failed with HTTP status {status}")]
    Fetch {
        /// URL that was requested
        url: String,
        /// HTTP status returned by the remote server
        status: u16,
    },

    /// Job exceeded its configured time budget
    #[error("job timed out after {secs} seconds")]
    Timeout {
        /// Configured timeout in seconds
        secs: u64,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// API error response format
///
/// Returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "missing_parameter",
///     "message": "missing required parameter: url",
///     "details": { "parameter": "url" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "source_not_found")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - client supplied unusable input
            Error::Config { .. } => 400,
            Error::MissingParameter(_) => 400,
            Error::InvalidParameter { .. } => 400,
            Error::InvalidPageRange { .. } => 400,

            // 404 Not Found
            Error::SourceNotFound(_) => 404,
            Error::TaskNotFound(_) => 404,

            // 409 Conflict - result not available yet
            Error::TaskNotReady { .. } => 409,

            // 422 Unprocessable Entity - the document itself is unusable
            Error::Document(_) => 422,

            // 500 Internal Server Error
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - upstream collaborators
            Error::Network(_) => 502,
            Error::Fetch { .. } => 502,
            Error::Summarize(_) => 502,

            // 503 Service Unavailable
            Error::QueueFull { .. } => 503,
            Error::ShuttingDown => 503,

            // 504 Gateway Timeout
            Error::Timeout { .. } => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::MissingParameter(_) => "missing_parameter",
            Error::InvalidParameter { .. } => "invalid_parameter",
            Error::InvalidPageRange { .. } => "invalid_page_range",
            Error::SourceNotFound(_) => "source_not_found",
            Error::TaskNotFound(_) => "task_not_found",
            Error::TaskNotReady { .. } => "task_not_ready",
            Error::QueueFull { .. } => "queue_full",
            Error::ShuttingDown => "shutting_down",
            Error::Document(_) => "document_error",
            Error::Summarize(_) => "summarizer_error",
            Error::Fetch { .. } => "fetch_failed",
            Error::Timeout { .. } => "timeout",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::MissingParameter(name) => Some(serde_json::json!({
                "parameter": name,
            })),
            Error::InvalidParameter { name, reason } => Some(serde_json::json!({
                "parameter": name,
                "reason": reason,
            })),
            Error::InvalidPageRange {
                start,
                end,
                page_count,
            } => Some(serde_json::json!({
                "start_page": start,
                "end_page": end,
                "page_count": page_count,
            })),
            Error::TaskNotReady { id, state } => Some(serde_json::json!({
                "task_id": id,
                "state": state,
            })),
            Error::QueueFull { capacity } => Some(serde_json::json!({
                "capacity": capacity,
            })),
            Error::Fetch { url, status } => Some(serde_json::json!({
                "url": url,
                "status": status,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
