//! Configuration types for chapter-feed

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Main configuration for the chapter service
///
/// Fields are organized into sub-configs:
/// - [`storage`](StorageConfig) - cache directory and database path
/// - [`workers`](WorkerConfig) - pool size, queue bound, task retention
/// - [`summary`](SummaryConfig) - description caps and summarizer backend
/// - [`fetch`](FetchConfig) - HTTP client settings and retry policy
/// - [`outline`](OutlineConfig) - fallback outline detection
/// - [`feed`](FeedConfig) - RSS channel metadata
/// - [`server`](ServerIntegrationConfig) - REST API
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// On-disk storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Worker pool and task retention
    #[serde(default)]
    pub workers: WorkerConfig,

    /// Chapter description generation
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Source document fetching
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Outline detection
    #[serde(default)]
    pub outline: OutlineConfig,

    /// RSS channel metadata
    #[serde(default)]
    pub feed: FeedConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Directory holding cached source documents
    pub fn cache_dir(&self) -> &PathBuf {
        &self.storage.cache_dir
    }

    /// Directory holding materialized chapter sub-documents
    pub fn chapters_dir(&self) -> PathBuf {
        self.storage.cache_dir.join("chapters")
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.workers.max_concurrent_jobs == 0 {
            return Err(crate::Error::Config {
                message: "at least one worker is required".to_string(),
                key: Some("workers.max_concurrent_jobs".to_string()),
            });
        }
        if self.workers.queue_capacity == 0 {
            return Err(crate::Error::Config {
                message: "queue capacity must be positive".to_string(),
                key: Some("workers.queue_capacity".to_string()),
            });
        }
        if self.storage.max_stored_tasks == 0 {
            return Err(crate::Error::Config {
                message: "at least one finished task must be stored".to_string(),
                key: Some("storage.max_stored_tasks".to_string()),
            });
        }
        if self.summary.max_pages == 0 {
            return Err(crate::Error::Config {
                message: "summaries need at least one page of text".to_string(),
                key: Some("summary.max_pages".to_string()),
            });
        }
        if self.summary.min_length > self.summary.max_length {
            return Err(crate::Error::Config {
                message: format!(
                    "min_length ({}) exceeds max_length ({})",
                    self.summary.min_length, self.summary.max_length
                ),
                key: Some("summary.min_length".to_string()),
            });
        }
        Ok(())
    }
}

/// Storage locations
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Directory for cached documents and extracted chapters (default: "./cache")
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Database path (default: "./chapter-feed.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Finished task records kept on disk (default: 10000)
    ///
    /// Records beyond this count are deleted oldest-finished first, together
    /// with their cached document and chapter files.
    #[serde(default = "default_max_stored_tasks")]
    pub max_stored_tasks: usize,

    /// Age after which finished task records and their files are deleted (None = never)
    #[serde(default, with = "optional_duration_serde")]
    pub retention: Option<Duration>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            database_path: default_database_path(),
            max_stored_tasks: default_max_stored_tasks(),
            retention: None,
        }
    }
}

/// Worker pool configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkerConfig {
    /// Maximum jobs executing at once (default: 3)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Maximum jobs waiting for a worker before submissions are rejected (default: 64)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Finished task records kept in memory before least-recently-used eviction (default: 1024)
    #[serde(default = "default_max_tracked_tasks")]
    pub max_tracked_tasks: usize,

    /// Age after which finished task records are evicted (None = never)
    #[serde(default, with = "optional_duration_serde")]
    pub task_ttl: Option<Duration>,

    /// Time budget for a single job (default: 15 minutes, None = unbounded)
    #[serde(
        default = "default_job_timeout",
        with = "optional_duration_serde"
    )]
    pub job_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            queue_capacity: default_queue_capacity(),
            max_tracked_tasks: default_max_tracked_tasks(),
            task_ttl: None,
            job_timeout: default_job_timeout(),
        }
    }
}

/// Chapter description configuration
///
/// Only the opening of each chapter is summarized: at most `max_pages` pages,
/// cut to `max_chars` characters. Later content never reaches the summarizer.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SummaryConfig {
    /// Maximum pages of chapter text fed to the summarizer (default: 20)
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Maximum characters of chapter text fed to the summarizer (default: 800)
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Upper bound on summary length, in words (default: 150)
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Lower bound on summary length, in words, when the text allows (default: 30)
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Summarization backend
    #[serde(default)]
    pub backend: SummaryBackend,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_chars: default_max_chars(),
            max_length: default_max_length(),
            min_length: default_min_length(),
            backend: SummaryBackend::default(),
        }
    }
}

/// Which summarizer produces chapter descriptions
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SummaryBackend {
    /// Deterministic sentence extraction, no external service
    #[default]
    Extractive,
    /// OpenAI-compatible chat completions endpoint
    Http {
        /// Full URL of the chat completions endpoint
        endpoint: String,
        /// Model name sent with each request
        model: String,
        /// Bearer token (optional for local servers)
        #[serde(default)]
        api_key: Option<String>,
        /// Request timeout (default: 60 seconds)
        #[serde(default = "default_http_timeout", with = "duration_serde")]
        timeout: Duration,
    },
}

/// Source fetching configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FetchConfig {
    /// Request timeout (default: 60 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Outline detection configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct OutlineConfig {
    /// Detect chapter headings from page text when a document has no outline (default: false)
    #[serde(default)]
    pub heading_fallback: bool,
}

/// RSS channel metadata
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedConfig {
    /// Channel title (default: "PDF Chapters Feed")
    #[serde(default = "default_feed_title")]
    pub title: String,

    /// Channel description (default: "RSS feed of PDF chapters")
    #[serde(default = "default_feed_description")]
    pub description: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: default_feed_title(),
            description: default_feed_description(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6789)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Base URL used in feed item links (default: derived from the request Host header)
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            public_base_url: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./chapter-feed.db")
}

fn default_max_concurrent_jobs() -> usize {
    3
}

fn default_queue_capacity() -> usize {
    64
}

fn default_max_tracked_tasks() -> usize {
    1024
}

fn default_max_stored_tasks() -> usize {
    10_000
}

fn default_job_timeout() -> Option<Duration> {
    Some(Duration::from_secs(15 * 60))
}

fn default_max_pages() -> usize {
    20
}

fn default_max_chars() -> usize {
    800
}

fn default_max_length() -> usize {
    150
}

fn default_min_length() -> usize {
    30
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    format!("chapter-feed/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_feed_title() -> String {
    "PDF Chapters Feed".to_string()
}

fn default_feed_description() -> String {
    "RSS feed of PDF chapters".to_string()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6789))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
