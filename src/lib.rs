//! # chapter-feed
//!
//! Splits remote PDF documents into chapters and publishes them as RSS feeds.
//!
//! ## Design Philosophy
//!
//! chapter-feed is designed to be:
//! - **Outline driven** - Chapters come from the document's embedded bookmarks
//! - **Asynchronous** - Submission returns immediately; clients poll for results
//! - **Library-first** - The REST API is a thin layer over [`ChapterService`]
//! - **Event-driven** - Consumers can subscribe to task events instead of polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use chapter_feed::{ChapterService, Config, TaskState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ChapterService::new(Config::default()).await?;
//!
//!     let mut events = service.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let status = service.submit("https://example.com/book.pdf").await?;
//!     if status.state == TaskState::Completed {
//!         for chapter in status.chapters.unwrap_or_default() {
//!             println!("{} ({}..={})", chapter.title, chapter.start_page, chapter.end_page);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Document access: outline, page text, page-range extraction
pub mod document;
/// Error types
pub mod error;
/// Chapter sub-document materialization
pub mod extract;
/// RSS rendering
pub mod feed;
/// Source download and on-disk cache
pub mod fetch;
/// Task orchestration (decomposed into focused submodules)
pub mod orchestrator;
/// Outline resolution and heading fallback
pub mod outline;
/// Retry logic with exponential backoff
pub mod retry;
/// Chapter segmentation
pub mod segment;
/// Chapter description generation
pub mod summarize;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, SummaryBackend};
pub use db::Database;
pub use document::{Document, DocumentLoader, PdfLoader};
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus};
pub use fetch::{HttpFetcher, SourceFetcher};
pub use orchestrator::{ChapterService, Collaborators, Job, JobRunner};
pub use segment::resolve_spans;
pub use summarize::{ExtractiveSummarizer, HttpSummarizer, Summarizer};
pub use types::{
    ChapterRecord, ChapterSpan, Event, OutlineEntry, PageRange, QueueStats, TaskId, TaskState,
    TaskStatus,
};

/// Helper function to run the service with graceful signal handling.
///
/// Waits for a termination signal and then calls the service's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use chapter_feed::{ChapterService, Config, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = Arc::new(ChapterService::new(Config::default()).await?);
///     let _api = service.spawn_api_server();
///
///     run_with_shutdown(&service).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: &ChapterService) -> Result<()> {
    wait_for_signal().await;
    service.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
