//! Chapter description generation
//!
//! A [`Summarizer`] turns the opening text of a chapter into a short
//! description. Two backends exist:
//!
//! - [`ExtractiveSummarizer`]: picks leading sentences, no external service
//! - [`HttpSummarizer`]: asks an OpenAI-compatible chat completions endpoint
//!
//! Both must be deterministic for a fixed input so chapter lists are
//! reproducible.

mod extractive;
mod http;

pub use extractive::ExtractiveSummarizer;
pub use http::HttpSummarizer;

use crate::config::{RetryConfig, SummaryBackend};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Produces a natural-language description of a block of text
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `text` in at most `max_length` words, aiming for at least
    /// `min_length` when the text is long enough
    async fn summarize(&self, text: &str, max_length: usize, min_length: usize) -> Result<String>;
}

/// Build the summarizer selected by configuration
pub fn from_config(backend: &SummaryBackend, retry: &RetryConfig) -> Result<Arc<dyn Summarizer>> {
    match backend {
        SummaryBackend::Extractive => Ok(Arc::new(ExtractiveSummarizer::new())),
        SummaryBackend::Http {
            endpoint,
            model,
            api_key,
            timeout,
        } => Ok(Arc::new(HttpSummarizer::new(
            endpoint.clone(),
            model.clone(),
            api_key.clone(),
            *timeout,
            retry.clone(),
        )?)),
    }
}
