//! Bounded retention of finished tasks on disk.
//!
//! The in-memory store only bounds memory. Here the persisted records are
//! capped by count and age, and a pruned task takes its cached source and
//! chapter documents with it.

use crate::error::Result;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::ChapterService;

/// Interval between background retention sweeps
const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

impl ChapterService {
    /// Delete finished task records and files beyond the storage bounds
    ///
    /// Keeps at most `storage.max_stored_tasks` finished records and, when
    /// `storage.retention` is set, none finished longer ago than that.
    /// Returns the number of tasks pruned.
    pub async fn prune_storage(&self) -> Result<usize> {
        let storage = &self.config.storage;
        let cutoff = storage.retention.map(|age| {
            let age = i64::try_from(age.as_secs()).unwrap_or(i64::MAX);
            chrono::Utc::now().timestamp().saturating_sub(age)
        });

        let pruned = self
            .db
            .prune_finished(storage.max_stored_tasks, cutoff)
            .await?;

        for id in &pruned {
            self.store.forget(id);
            // Resubmitted in the meantime: its files are in use again
            if self.store.is_processing(id) {
                continue;
            }
            if let Err(e) = self.extractor.purge(&id.document_file_name()).await {
                tracing::warn!(task_id = %id, error = %e, "failed to delete files of pruned task");
            }
        }

        if !pruned.is_empty() {
            tracing::info!(pruned = pruned.len(), "pruned stored tasks");
        }
        Ok(pruned.len())
    }

    /// Start the periodic retention sweep, stopped by shutdown
    pub(crate) fn start_retention_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        let shutdown = self.queue_state.shutdown.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = service.prune_storage().await {
                            tracing::warn!(error = %e, "retention sweep failed");
                        }
                    }
                }
            }
            tracing::debug!("retention sweeper stopped");
        })
    }
}
