//! Retry with exponential backoff for transient failures
//!
//! Used by the source fetcher and the remote summarizer. Each attempt that
//! fails with a retryable error waits `initial_delay * multiplier^n`, capped
//! at `max_delay`, optionally stretched by up to 100% random jitter.

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies errors as transient (worth retrying) or permanent
pub trait IsRetryable {
    /// Returns true if the operation should be attempted again
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // 408 request timeout, 429 rate limited, any 5xx
            Error::Fetch { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            Error::Config { .. }
            | Error::MissingParameter(_)
            | Error::InvalidParameter { .. }
            | Error::InvalidPageRange { .. }
            | Error::SourceNotFound(_)
            | Error::TaskNotFound(_)
            | Error::TaskNotReady { .. }
            | Error::QueueFull { .. }
            | Error::ShuttingDown
            | Error::Document(_)
            | Error::Summarize(_)
            | Error::Timeout { .. }
            | Error::Database(_)
            | Error::Sqlx(_)
            | Error::Serialization(_)
            | Error::ApiServerError(_)
            | Error::Other(_) => false,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// Returns the last error once `config.max_attempts` retries are exhausted.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = wait.as_millis(),
                    "operation failed, retrying"
                );
                tokio::time::sleep(wait).await;

                delay = Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
                    .min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(error = %e, attempts = attempt + 1, "retry attempts exhausted");
                } else {
                    tracing::debug!(error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Stretch a delay by a uniform factor in [1.0, 2.0]
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + factor))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn fetch_error(status: u16) -> Error {
        Error::Fetch {
            url: "https://example.com/a.pdf".to_string(),
            status,
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result = with_retry(&fast_config(3), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result = with_retry(&fast_config(3), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(fetch_error(503))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result = with_retry(&fast_config(2), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(fetch_error(500))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Fetch { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "initial attempt plus two retries");
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result = with_retry(&fast_config(5), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(fetch_error(404))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fetch_status_classification() {
        assert!(fetch_error(429).is_retryable());
        assert!(fetch_error(408).is_retryable());
        assert!(fetch_error(502).is_retryable());
        assert!(!fetch_error(403).is_retryable());
        assert!(!fetch_error(404).is_retryable());
    }

    #[test]
    fn io_error_classification() {
        let reset = Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        let missing = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));

        assert!(reset.is_retryable());
        assert!(!missing.is_retryable());
    }

    #[test]
    fn domain_errors_are_permanent() {
        assert!(!Error::Document("no outline".into()).is_retryable());
        assert!(!Error::QueueFull { capacity: 1 }.is_retryable());
        assert!(!Error::ShuttingDown.is_retryable());
        assert!(!Error::Timeout { secs: 1 }.is_retryable());
    }

    #[test]
    fn jitter_stays_within_double() {
        let base = Duration::from_millis(100);
        for _ in 0..100 {
            let d = add_jitter(base);
            assert!(d >= base && d <= base * 2, "jittered delay {d:?} out of range");
        }
    }
}
