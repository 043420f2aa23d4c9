//! Shared helpers for creating ChapterService instances in tests.

use crate::config::Config;
use crate::document::PdfLoader;
use crate::error::{Error, Result};
use crate::orchestrator::{ChapterService, Job, JobRunner};
use crate::types::{ChapterRecord, TaskState, TaskStatus};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// What a [`StubRunner`] does once its gate opens
#[derive(Clone, Debug)]
pub(crate) enum Outcome {
    Chapters(Vec<ChapterRecord>),
    Fail(String),
    Panic,
    Sleep(Duration),
}

/// Job runner that records concurrency and can be held at a gate
pub(crate) struct StubRunner {
    gate: Semaphore,
    outcome: Outcome,
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl StubRunner {
    /// Runner that finishes immediately with `outcome`
    pub(crate) fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self::build(outcome, Semaphore::MAX_PERMITS))
    }

    /// Runner whose jobs wait until [`release`](Self::release) is called
    pub(crate) fn gated(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self::build(outcome, 0))
    }

    fn build(outcome: Outcome, permits: usize) -> Self {
        Self {
            gate: Semaphore::new(permits),
            outcome,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Let `n` waiting or future jobs proceed
    pub(crate) fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobRunner for StubRunner {
    async fn run(&self, _job: &Job) -> Result<Vec<ChapterRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let permit = self.gate.acquire().await;
        if let Ok(permit) = permit {
            permit.forget();
        }

        let result = match &self.outcome {
            Outcome::Chapters(chapters) => Ok(chapters.clone()),
            Outcome::Fail(message) => Err(Error::Other(message.clone())),
            Outcome::Panic => {
                self.running.fetch_sub(1, Ordering::SeqCst);
                panic!("stub runner exploded");
            }
            Outcome::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(vec![])
            }
        };
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Chapter list used by successful stub runs
pub(crate) fn sample_chapters() -> Vec<ChapterRecord> {
    vec![
        ChapterRecord {
            title: "Intro".to_string(),
            description: "Opening words.".to_string(),
            start_page: 0,
            end_page: 4,
        },
        ChapterRecord {
            title: "Body".to_string(),
            description: "Main part.".to_string(),
            start_page: 5,
            end_page: 9,
        },
    ]
}

/// Config rooted in `dir` with three workers
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.cache_dir = dir.join("cache");
    config.storage.database_path = dir.join("test.db");
    config.workers.max_concurrent_jobs = 3;
    config
}

/// Create a service around `runner` in a fresh temp dir
///
/// Returns the service and the tempdir (which must be kept alive).
pub(crate) async fn create_test_service(
    runner: Arc<StubRunner>,
    tweak: impl FnOnce(&mut Config),
) -> (ChapterService, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    tweak(&mut config);
    let service = ChapterService::with_runner(config, Arc::new(PdfLoader::new()), runner)
        .await
        .unwrap();
    (service, temp_dir)
}

/// Poll until the task leaves Processing, failing the test after five seconds
pub(crate) async fn wait_until_finished(service: &ChapterService, url: &str) -> TaskStatus {
    let id = crate::types::TaskId::from_source(url);
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = service.status(&id).await.unwrap();
            if matches!(status.state, TaskState::Completed | TaskState::Failed) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task did not finish in time")
}

/// Poll until `condition` holds, failing the test after five seconds
pub(crate) async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
