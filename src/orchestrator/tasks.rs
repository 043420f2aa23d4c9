//! Submission, polling and statistics.

use crate::db::TaskWrite;
use crate::error::{Error, Result};
use crate::fetch::validate_source_url;
use crate::types::{Event, QueueStats, TaskId, TaskState, TaskStatus};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc::error::TrySendError;

use super::ChapterService;
use super::pipeline::Job;
use super::store::Begin;

impl ChapterService {
    /// Submit a source document for segmentation
    ///
    /// Returns immediately. A completed task returns its chapters; a task that
    /// is already processing returns its current status. Otherwise the task
    /// moves to Processing and one job is queued. Submitting the same URL
    /// concurrently never queues a second job. Failed tasks may be resubmitted.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingParameter`] / [`Error::InvalidParameter`] for a bad URL
    /// - [`Error::ShuttingDown`] once shutdown has started
    /// - [`Error::QueueFull`] when the queue is at capacity; nothing is recorded
    pub async fn submit(&self, source_url: &str) -> Result<TaskStatus> {
        validate_source_url(source_url)?;
        let source_url = source_url.trim();

        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let id = TaskId::from_source(source_url);

        // A completed result may only exist on disk after a restart or eviction
        if self.store.status(&id).state == TaskState::Unknown
            && let Some(persisted) = self.load_persisted(&id).await?
            && persisted.state == TaskState::Completed
        {
            return Ok(self.store.insert_finished(&id, &persisted));
        }

        let prior = match self.store.begin(&id, source_url) {
            Begin::Existing(status) => {
                tracing::debug!(task_id = %id, state = %status.state, "task already known");
                return Ok(status);
            }
            Begin::Started { prior } => prior,
        };

        if let Err(e) = self.persist_processing(&id, source_url).await {
            tracing::warn!(task_id = %id, error = %e, "failed to persist processing task");
        }

        let job = Job {
            id: id.clone(),
            source_url: source_url.to_string(),
        };
        self.queue_state.queued.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.queue_state.tx.try_send(job) {
            self.queue_state.queued.fetch_sub(1, Ordering::SeqCst);
            let restore_failed = prior.as_ref().map(|p| p.status(&id));
            self.store.rollback(&id, prior);
            self.unpersist_processing(&id, restore_failed).await;

            return Err(match e {
                TrySendError::Full(_) => {
                    tracing::warn!(task_id = %id, "job queue full, rejecting submission");
                    Error::QueueFull {
                        capacity: self.config.workers.queue_capacity,
                    }
                }
                TrySendError::Closed(_) => Error::ShuttingDown,
            });
        }

        tracing::info!(task_id = %id, url = source_url, "task queued");
        self.emit_event(Event::TaskQueued {
            id: id.clone(),
            url: source_url.to_string(),
        });

        Ok(self.store.status(&id))
    }

    /// Current status of a task
    ///
    /// Falls back to persisted records for tasks no longer held in memory, so
    /// a completed task keeps reporting completed with the same chapters.
    pub async fn status(&self, id: &TaskId) -> Result<TaskStatus> {
        let status = self.store.status(id);
        if status.state != TaskState::Unknown {
            return Ok(status);
        }

        match self.load_persisted(id).await? {
            Some(persisted)
                if matches!(persisted.state, TaskState::Completed | TaskState::Failed) =>
            {
                Ok(self.store.insert_finished(id, &persisted))
            }
            _ => Ok(status),
        }
    }

    /// Worker pool statistics
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queued: self.queue_state.queued.load(Ordering::SeqCst),
            active: self.queue_state.active.load(Ordering::SeqCst),
            max_concurrent: self.config.workers.max_concurrent_jobs,
            queue_capacity: self.config.workers.queue_capacity,
            tracked: self.store.len(),
        }
    }

    /// Render the RSS feed of a completed task
    ///
    /// `base_url` is the public root used in chapter links.
    pub fn feed_xml(&self, status: &TaskStatus, base_url: &str) -> Result<String> {
        let chapters = match (&status.state, &status.chapters) {
            (TaskState::Completed, Some(chapters)) => chapters,
            _ => {
                return Err(Error::TaskNotReady {
                    id: status.task_id.to_string(),
                    state: status.state.to_string(),
                });
            }
        };

        let source_url = status.source_url.as_deref().unwrap_or_default();
        Ok(self.feed.render(
            source_url,
            base_url,
            &status.task_id.document_file_name(),
            chapters,
        ))
    }

    /// Materialize the sub-document for pages `start..=end` of a cached file
    pub async fn chapter_document(&self, file: &str, start: i64, end: i64) -> Result<PathBuf> {
        self.extractor.materialize(file, start, end).await
    }

    async fn load_persisted(&self, id: &TaskId) -> Result<Option<TaskStatus>> {
        match self.db.get_task(id).await? {
            Some(row) => Ok(Some(row.into_status()?)),
            None => Ok(None),
        }
    }

    async fn persist_processing(&self, id: &TaskId, source_url: &str) -> Result<()> {
        self.db
            .upsert_task(&TaskWrite {
                id,
                source_url,
                state: TaskState::Processing,
                chapters: None,
                error: None,
            })
            .await
    }

    // Put the persisted record back the way it was before a rejected submission
    async fn unpersist_processing(&self, id: &TaskId, prior: Option<TaskStatus>) {
        let result = match prior {
            Some(prior) => {
                self.db
                    .upsert_task(&TaskWrite {
                        id,
                        source_url: prior.source_url.as_deref().unwrap_or_default(),
                        state: prior.state,
                        chapters: prior.chapters.as_deref(),
                        error: prior.error.as_deref(),
                    })
                    .await
            }
            None => self.db.delete_task(id).await.map(|_| ()),
        };
        if let Err(e) = result {
            tracing::warn!(task_id = %id, error = %e, "failed to roll back persisted task");
        }
    }
}
