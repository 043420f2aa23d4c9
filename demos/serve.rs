//! REST API server demo
//!
//! Runs chapter-feed with the REST API enabled.
//!
//! ```bash
//! cargo run --example serve                  # defaults
//! cargo run --example serve -- config.json   # settings from a JSON file
//! RUST_LOG=chapter_feed=debug cargo run --example serve
//! ```
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:6789/swagger-ui
//! - Submit a document via GET http://localhost:6789/rss?url=<pdf url>
//! - Poll via GET http://localhost:6789/tasks/<task id>
//! - Stream events via GET http://localhost:6789/events

use chapter_feed::{ChapterService, Config, run_with_shutdown};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config: Config = match std::env::args().nth(1) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };
    let bind = config.server.api.bind_address;

    let service = Arc::new(ChapterService::new(config).await?);
    let api = service.spawn_api_server();

    println!("Swagger UI:    http://{bind}/swagger-ui");
    println!("Submit:        curl 'http://{bind}/rss?url=https://example.com/book.pdf'");
    println!("Events stream: curl -N http://{bind}/events");

    run_with_shutdown(&service).await?;
    api.await??;
    Ok(())
}
