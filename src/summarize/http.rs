use super::Summarizer;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Summarizes through an OpenAI-compatible chat completions endpoint
///
/// Requests use temperature 0 so a fixed model returns stable output.
/// Transient failures (timeouts, 429, 5xx) are retried per the fetch retry
/// policy; anything left over surfaces as [`Error::Summarize`].
pub struct HttpSummarizer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl HttpSummarizer {
    /// Create a summarizer for `endpoint` using `model`
    pub fn new(
        endpoint: String,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Summarize(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            model,
            api_key,
            retry,
        })
    }

    async fn request(&self, body: &ChatRequest<'_>) -> Result<String> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.trim());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| Error::Summarize("response contained no choices".to_string()))
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, text: &str, max_length: usize, min_length: usize) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let instruction = format!(
            "Summarize the user's text in {min_length} to {max_length} words. \
             Reply with the summary only."
        );
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            // Words run a little over one token each
            max_tokens: max_length * 2,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &instruction,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        with_retry(&self.retry, || self.request(&body))
            .await
            .map_err(|e| match e {
                Error::Summarize(_) => e,
                other => Error::Summarize(other.to_string()),
            })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}
