//! Task orchestration split into focused submodules.
//!
//! The [`ChapterService`] struct and its methods are organized by domain:
//! - [`store`] - Atomic task state and retention
//! - [`tasks`] - Submission, polling and statistics
//! - [`queue_processor`] - Bounded worker pool draining the job queue
//! - [`pipeline`] - Job execution (fetch, outline, segment, describe)
//! - [`lifecycle`] - Restore on startup and graceful shutdown
//! - [`retention`] - Count and age bounds on stored tasks and their files

mod lifecycle;
mod pipeline;
mod queue_processor;
mod retention;
mod store;
mod tasks;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use pipeline::{ChapterPipeline, Job, JobRunner};
pub use store::TaskStore;

use crate::config::Config;
use crate::db::Database;
use crate::document::{DocumentLoader, PdfLoader};
use crate::error::{Error, Result};
use crate::extract::ChapterExtractor;
use crate::feed::FeedRenderer;
use crate::fetch::{DocumentCache, HttpFetcher, SourceFetcher};
use crate::summarize::{self, Summarizer};
use crate::types::Event;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

/// External services the pipeline depends on
#[derive(Clone)]
pub struct Collaborators {
    /// Source document fetcher
    pub fetcher: Arc<dyn SourceFetcher>,
    /// Document loader and page-range writer
    pub loader: Arc<dyn DocumentLoader>,
    /// Chapter description generator
    pub summarizer: Arc<dyn Summarizer>,
}

impl Collaborators {
    /// Production collaborators selected by configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            fetcher: Arc::new(HttpFetcher::new(&config.fetch)?),
            loader: Arc::new(PdfLoader::new()),
            summarizer: summarize::from_config(&config.summary.backend, &config.fetch.retry)?,
        })
    }
}

/// Queue and worker state
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Sending half of the bounded FIFO job queue
    pub(crate) tx: mpsc::Sender<Job>,
    /// Limits concurrently executing jobs
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Jobs accepted but not yet started
    pub(crate) queued: Arc<AtomicUsize>,
    /// Jobs currently executing
    pub(crate) active: Arc<AtomicUsize>,
    /// Cleared during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled when shutdown begins
    pub(crate) shutdown: CancellationToken,
}

/// Main service instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ChapterService {
    /// Database instance for persistence
    /// Public for integration tests to inspect stored tasks
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Task states
    pub(crate) store: Arc<TaskStore>,
    /// Queue and worker state
    pub(crate) queue_state: QueueState,
    /// Executes dequeued jobs
    pub(crate) runner: Arc<dyn JobRunner>,
    /// Chapter sub-document producer
    pub(crate) extractor: Arc<ChapterExtractor>,
    /// RSS renderer
    pub(crate) feed: FeedRenderer,
}

impl ChapterService {
    /// Create a service with production collaborators
    ///
    /// This initializes all core components:
    /// - Creates the cache directories
    /// - Opens/creates the SQLite database and runs migrations
    /// - Starts the queue processor
    /// - Re-queues tasks that were processing when the last run stopped
    /// - Starts the retention sweep over stored tasks
    pub async fn new(config: Config) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config)?;
        Self::with_collaborators(config, collaborators).await
    }

    /// Create a service with caller-supplied collaborators
    pub async fn with_collaborators(config: Config, collaborators: Collaborators) -> Result<Self> {
        let cache = Arc::new(DocumentCache::new(
            config.cache_dir().clone(),
            collaborators.fetcher,
        ));
        let runner = Arc::new(ChapterPipeline::new(
            &config,
            cache,
            collaborators.loader.clone(),
            collaborators.summarizer,
        ));
        Self::with_runner(config, collaborators.loader, runner).await
    }

    /// Create a service around an arbitrary job runner
    pub async fn with_runner(
        config: Config,
        loader: Arc<dyn DocumentLoader>,
        runner: Arc<dyn JobRunner>,
    ) -> Result<Self> {
        config.validate()?;

        for dir in [config.cache_dir().clone(), config.chapters_dir()] {
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                ))
            })?;
        }

        let db = Database::new(&config.storage.database_path).await?;

        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        let (tx, rx) = mpsc::channel(config.workers.queue_capacity);

        let queue_state = QueueState {
            tx,
            concurrent_limit: Arc::new(Semaphore::new(config.workers.max_concurrent_jobs)),
            queued: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown: CancellationToken::new(),
        };

        let store = Arc::new(TaskStore::new(
            config.workers.max_tracked_tasks,
            config.workers.task_ttl,
        ));
        let extractor = Arc::new(ChapterExtractor::new(
            config.cache_dir().clone(),
            config.chapters_dir(),
            loader,
        ));
        let feed = FeedRenderer::new(&config.feed);

        let service = Self {
            db: Arc::new(db),
            event_tx,
            config: Arc::new(config),
            store,
            queue_state,
            runner,
            extractor,
            feed,
        };

        service.start_queue_processor(rx);

        let restored = service.restore_tasks().await?;
        if restored > 0 {
            tracing::info!(restored, "Re-queued interrupted tasks");
        }

        service.start_retention_sweeper();

        Ok(service)
    }

    /// Subscribe to task events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls more than 1000 events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Token cancelled once [`shutdown`](Self::shutdown) begins
    pub fn shutdown_token(&self) -> CancellationToken {
        self.queue_state.shutdown.clone()
    }

    /// Emit an event to all subscribers; dropped silently when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let service = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(service, config).await })
    }
}
