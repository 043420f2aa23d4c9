//! Application state for the API server

use crate::{ChapterService, Config};
use axum::http::{HeaderMap, header};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the service instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The chapter service
    pub service: Arc<ChapterService>,

    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<ChapterService>, config: Arc<Config>) -> Self {
        Self { service, config }
    }

    /// Public root used in feed item links
    ///
    /// The configured `public_base_url` wins; otherwise the request's Host
    /// header, then the bind address.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(base) = &self.config.server.api.public_base_url {
            return base.trim_end_matches('/').to_string();
        }

        match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
            Some(host) => format!("http://{host}"),
            None => format!("http://{}", self.config.server.api.bind_address),
        }
    }
}
