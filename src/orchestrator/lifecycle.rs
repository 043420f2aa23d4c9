//! Startup and shutdown coordination.

use crate::error::Result;
use crate::types::{Event, TaskId, TaskState};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;

use super::ChapterService;
use super::pipeline::Job;
use super::store::Begin;

/// How long shutdown waits for running jobs
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl ChapterService {
    /// Re-queue tasks that were processing when the service last stopped
    ///
    /// Returns the number of tasks queued again. Tasks that no longer fit in
    /// the queue are marked failed so they can be resubmitted.
    pub(crate) async fn restore_tasks(&self) -> Result<usize> {
        let rows = self.db.list_tasks_by_state(TaskState::Processing).await?;
        let mut restored = 0;

        for row in rows {
            let id: TaskId = match row.id.parse() {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(task_id = %row.id, error = %e, "skipping malformed task record");
                    continue;
                }
            };

            if let Begin::Existing(_) = self.store.begin(&id, &row.source_url) {
                continue;
            }

            let job = Job {
                id: id.clone(),
                source_url: row.source_url.clone(),
            };
            self.queue_state.queued.fetch_add(1, Ordering::SeqCst);

            match self.queue_state.tx.try_send(job) {
                Ok(()) => {
                    tracing::debug!(task_id = %id, "restored interrupted task");
                    restored += 1;
                }
                Err(TrySendError::Full(job) | TrySendError::Closed(job)) => {
                    self.queue_state.queued.fetch_sub(1, Ordering::SeqCst);
                    self.finish_failed(&job, "interrupted and could not be re-queued")
                        .await;
                }
            }
        }

        Ok(restored)
    }

    /// Gracefully shut down the service
    ///
    /// 1. Stops accepting submissions
    /// 2. Stops the queue processor; waiting jobs stay Processing on disk
    /// 3. Waits up to 30 seconds for running jobs to finish
    /// 4. Emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.queue_state.accepting_new.store(false, Ordering::SeqCst);
        self.queue_state.shutdown.cancel();

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("All running jobs finished"),
            Err(_) => tracing::warn!(
                active = self.queue_state.active.load(Ordering::SeqCst),
                "Timeout waiting for running jobs, proceeding with shutdown"
            ),
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_for_active_jobs(&self) {
        while self.queue_state.active.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
