//! Source document fetching and the on-disk document cache
//!
//! Documents are cached under `cache_dir/<task id>.pdf`, where the task id is
//! the MD5 of the source URL. A cached file is never fetched again. Concurrent
//! requests for the same source share one download.

use crate::config::{FetchConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::TaskId;
use crate::utils::{KeyedLocks, write_atomic};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Retrieves the raw bytes of a source document
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the document at `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Check that a submitted source is an absolute http(s) URL
pub fn validate_source_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::MissingParameter("url".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| Error::InvalidParameter {
        name: "url".to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidParameter {
            name: "url".to_string(),
            reason: format!("unsupported scheme '{other}', expected http or https"),
        }),
    }
}

/// Fetches documents over HTTP with retry
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Build a fetcher from configuration
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            retry: config.retry.clone(),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        with_retry(&self.retry, || self.fetch_once(url)).await
    }
}

/// Content-addressed cache of source documents
pub struct DocumentCache {
    dir: PathBuf,
    fetcher: Arc<dyn SourceFetcher>,
    inflight: KeyedLocks<TaskId>,
}

impl DocumentCache {
    /// Create a cache rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
            inflight: KeyedLocks::new(),
        }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the document for `id` lives once cached
    pub fn path_for(&self, id: &TaskId) -> PathBuf {
        self.dir.join(id.document_file_name())
    }

    /// Return the cached document for `url`, fetching it first if needed
    pub async fn ensure(&self, id: &TaskId, url: &str) -> Result<PathBuf> {
        let path = self.path_for(id);
        let _guard = self.inflight.lock(id).await;

        if tokio::fs::try_exists(&path).await? {
            debug!(task_id = %id, path = %path.display(), "document already cached");
            return Ok(path);
        }

        info!(task_id = %id, url, "fetching source document");
        let bytes = self.fetcher.fetch(url).await?;
        write_atomic(&path, &bytes).await?;
        info!(task_id = %id, bytes = bytes.len(), "source document cached");

        Ok(path)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_fetch_config() -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(5),
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                backoff_multiplier: 2.0,
                jitter: false,
            },
            ..FetchConfig::default()
        }
    }

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SourceFetcher for Counting {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(b"%PDF-fake".to_vec())
        }
    }

    #[test]
    fn source_url_validation() {
        assert!(validate_source_url("https://example.com/a.pdf").is_ok());
        assert!(validate_source_url(" http://example.com/a.pdf ").is_ok());
        assert!(matches!(
            validate_source_url("  "),
            Err(Error::MissingParameter(_))
        ));
        assert!(matches!(
            validate_source_url("file:///etc/passwd"),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            validate_source_url("not a url"),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[tokio::test]
    async fn http_fetcher_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/book.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.5".to_vec()))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&fast_fetch_config()).unwrap();
        let body = fetcher
            .fetch(&format!("{}/book.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"%PDF-1.5");
    }

    #[tokio::test]
    async fn http_fetcher_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&fast_fetch_config()).unwrap();
        let result = fetcher.fetch(&format!("{}/x.pdf", server.uri())).await;

        assert!(matches!(result, Err(Error::Fetch { status: 502, .. })));
    }

    #[tokio::test]
    async fn http_fetcher_does_not_retry_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&fast_fetch_config()).unwrap();
        let result = fetcher.fetch(&format!("{}/missing.pdf", server.uri())).await;

        assert!(matches!(result, Err(Error::Fetch { status: 404, .. })));
    }

    #[tokio::test]
    async fn cache_fetches_each_source_once() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(DocumentCache::new(dir.path(), fetcher.clone()));
        let url = "https://example.com/book.pdf";
        let id = TaskId::from_source(url);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (cache, id) = (cache.clone(), id.clone());
                tokio::spawn(async move { cache.ensure(&id, url).await })
            })
            .collect();
        for h in handles {
            let path = h.await.unwrap().unwrap();
            assert_eq!(path, dir.path().join(format!("{id}.pdf")));
        }

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            std::fs::read(cache.path_for(&id)).unwrap(),
            b"%PDF-fake"
        );

        cache.ensure(&id, url).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1, "cached file is reused");
    }

    #[tokio::test]
    async fn failed_fetch_leaves_no_file() {
        struct Broken;

        #[async_trait]
        impl SourceFetcher for Broken {
            async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
                Err(Error::Fetch {
                    url: url.to_string(),
                    status: 500,
                })
            }
        }

        let dir = tempdir().unwrap();
        let cache = DocumentCache::new(dir.path(), Arc::new(Broken));
        let id = TaskId::from_source("https://example.com/a.pdf");

        assert!(cache.ensure(&id, "https://example.com/a.pdf").await.is_err());
        assert!(!cache.path_for(&id).exists());
    }
}
