//! Queue processor: drains the job queue into a bounded pool of workers.

use crate::db::TaskWrite;
use crate::error::{Error, Result};
use crate::types::{ChapterRecord, Event, TaskState};
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;

use super::ChapterService;
use super::pipeline::Job;

impl ChapterService {
    /// Start the queue processor task
    ///
    /// This method spawns a background task that continuously:
    /// 1. Acquires a permit from the concurrency limiter (respects max_concurrent_jobs)
    /// 2. Takes the next job in FIFO order
    /// 3. Spawns a worker for that job
    /// 4. Repeats until shutdown
    ///
    /// A job leaves the channel only once a worker is free for it, so at most
    /// `queue_capacity` jobs ever wait. Jobs still waiting when shutdown starts
    /// stay Processing in the database and are picked up again by
    /// [`restore_tasks`](Self::restore_tasks).
    pub(crate) fn start_queue_processor(
        &self,
        mut rx: mpsc::Receiver<Job>,
    ) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        let shutdown = self.queue_state.shutdown.clone();
        let concurrent_limit = self.queue_state.concurrent_limit.clone();

        tokio::spawn(async move {
            loop {
                // Blocks while max_concurrent_jobs workers are running
                let permit = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    permit = concurrent_limit.clone().acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => break,
                    },
                };

                let job = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    job = rx.recv() => match job {
                        Some(job) => job,
                        None => break,
                    },
                };
                service.queue_state.queued.fetch_sub(1, Ordering::SeqCst);

                let worker = service.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    worker.run_job(job).await;
                });
            }
            tracing::debug!("queue processor stopped");
        })
    }

    /// Execute one job and record its outcome
    pub(crate) async fn run_job(&self, job: Job) {
        self.queue_state.active.fetch_add(1, Ordering::SeqCst);
        tracing::info!(task_id = %job.id, url = %job.source_url, "task started");
        self.emit_event(Event::TaskStarted { id: job.id.clone() });

        match self.execute(&job).await {
            Ok(chapters) => self.finish_completed(&job, chapters).await,
            Err(e) => self.finish_failed(&job, &e.to_string()).await,
        }

        if let Err(e) = self.prune_storage().await {
            tracing::warn!(error = %e, "failed to prune stored tasks");
        }

        self.queue_state.active.fetch_sub(1, Ordering::SeqCst);
    }

    // Runs on its own task so a panic surfaces as a JoinError instead of
    // unwinding through the worker
    async fn execute(&self, job: &Job) -> Result<Vec<ChapterRecord>> {
        let runner = self.runner.clone();
        let owned = job.clone();
        let handle = tokio::spawn(async move { runner.run(&owned).await });
        let abort = handle.abort_handle();

        let joined = match self.config.workers.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort.abort();
                    return Err(Error::Timeout {
                        secs: limit.as_secs(),
                    });
                }
            },
            None => handle.await,
        };

        joined.map_err(|e| {
            if e.is_panic() {
                Error::Other(format!("job panicked: {}", panic_message(e.into_panic())))
            } else {
                Error::Other(format!("job cancelled: {e}"))
            }
        })?
    }

    async fn finish_completed(&self, job: &Job, chapters: Vec<ChapterRecord>) {
        let count = chapters.len();

        // Persist first so a result visible in memory is never lost on restart
        if let Err(e) = self
            .db
            .upsert_task(&TaskWrite {
                id: &job.id,
                source_url: &job.source_url,
                state: TaskState::Completed,
                chapters: Some(&chapters),
                error: None,
            })
            .await
        {
            tracing::error!(task_id = %job.id, error = %e, "failed to persist completed task");
        }

        if self.store.complete(&job.id, chapters) {
            tracing::info!(task_id = %job.id, chapters = count, "task completed");
            self.emit_event(Event::TaskCompleted {
                id: job.id.clone(),
                chapters: count,
            });
        } else {
            tracing::warn!(task_id = %job.id, "completed task was no longer processing");
        }
    }

    pub(crate) async fn finish_failed(&self, job: &Job, error: &str) {
        if let Err(e) = self
            .db
            .upsert_task(&TaskWrite {
                id: &job.id,
                source_url: &job.source_url,
                state: TaskState::Failed,
                chapters: None,
                error: Some(error),
            })
            .await
        {
            tracing::error!(task_id = %job.id, error = %e, "failed to persist failed task");
        }

        if self.store.fail(&job.id, error) {
            tracing::warn!(task_id = %job.id, error, "task failed");
            self.emit_event(Event::TaskFailed {
                id: job.id.clone(),
                error: error.to_string(),
            });
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
