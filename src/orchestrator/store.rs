//! In-memory task state with atomic transitions and bounded retention.
//!
//! A poller can never observe a task between "processing" and "completed".
//! The legal transitions are:
//!
//! ```text
//! Unknown | Failed  --begin-->     Processing
//! Processing        --complete-->  Completed
//! Processing        --fail-->      Failed
//! ```
//!
//! Processing entries sit in a plain map. Finished entries (completed or
//! failed) sit in an [`LruCache`] holding at most `max_finished`, and expire
//! after `ttl` if one is set. Both collections share one lock, so moving a
//! task between them is a single transition. Processing entries are never
//! evicted.

use crate::types::{ChapterRecord, TaskId, TaskState, TaskStatus};
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub(crate) struct TaskEntry {
    source_url: String,
    state: TaskState,
    chapters: Option<Arc<Vec<ChapterRecord>>>,
    error: Option<String>,
    updated_at: DateTime<Utc>,
    finished_at: Option<Instant>,
}

impl TaskEntry {
    pub(crate) fn status(&self, id: &TaskId) -> TaskStatus {
        TaskStatus {
            task_id: id.clone(),
            state: self.state,
            source_url: Some(self.source_url.clone()),
            chapters: self.chapters.as_ref().map(|c| c.as_ref().clone()),
            error: self.error.clone(),
            updated_at: Some(self.updated_at),
        }
    }
}

/// Outcome of [`TaskStore::begin`]
#[derive(Debug)]
pub(crate) enum Begin {
    /// The task moved to Processing; `prior` is what it replaced
    Started { prior: Option<TaskEntry> },
    /// The task is already processing or completed
    Existing(TaskStatus),
}

struct Inner {
    processing: HashMap<TaskId, TaskEntry>,
    /// `None` when no finished task is retained
    finished: Option<LruCache<TaskId, TaskEntry>>,
}

/// Lock-guarded task states
pub struct TaskStore {
    inner: Mutex<Inner>,
    ttl: Option<Duration>,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("tracked", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TaskStore {
    /// Create a store keeping at most `max_finished` finished tasks
    pub fn new(max_finished: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                processing: HashMap::new(),
                finished: NonZeroUsize::new(max_finished).map(LruCache::new),
            }),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn expired(&self, entry: &TaskEntry, now: Instant) -> bool {
        match (self.ttl, entry.finished_at) {
            (Some(ttl), Some(finished)) => now.duration_since(finished) >= ttl,
            _ => false,
        }
    }

    /// Live finished entry for `id`, refreshed as most recently used
    ///
    /// An expired entry is dropped and reported as absent.
    fn touch<'a>(&self, inner: &'a mut Inner, id: &TaskId) -> Option<&'a TaskEntry> {
        let finished = inner.finished.as_mut()?;
        let now = Instant::now();
        if finished.peek(id).is_some_and(|entry| self.expired(entry, now)) {
            finished.pop(id);
            return None;
        }
        finished.get(id)
    }

    /// Current status of `id`, marking it recently used
    pub fn status(&self, id: &TaskId) -> TaskStatus {
        let mut inner = self.lock();
        if let Some(entry) = inner.processing.get(id) {
            return entry.status(id);
        }
        match self.touch(&mut inner, id) {
            Some(entry) => entry.status(id),
            None => TaskStatus::unknown(id.clone()),
        }
    }

    /// Move `id` to Processing unless it is already processing or completed
    pub(crate) fn begin(&self, id: &TaskId, source_url: &str) -> Begin {
        let mut inner = self.lock();

        if let Some(entry) = inner.processing.get(id) {
            return Begin::Existing(entry.status(id));
        }
        if let Some(entry) = self.touch(&mut inner, id) {
            if entry.state == TaskState::Completed {
                return Begin::Existing(entry.status(id));
            }
        }

        let prior = inner.finished.as_mut().and_then(|f| f.pop(id));
        inner.processing.insert(
            id.clone(),
            TaskEntry {
                source_url: source_url.to_string(),
                state: TaskState::Processing,
                chapters: None,
                error: None,
                updated_at: Utc::now(),
                finished_at: None,
            },
        );
        Begin::Started { prior }
    }

    /// Undo a [`begin`](Self::begin) whose job could not be queued
    pub(crate) fn rollback(&self, id: &TaskId, prior: Option<TaskEntry>) {
        let mut inner = self.lock();
        if inner.processing.remove(id).is_none() {
            return;
        }
        if let Some(entry) = prior {
            self.retain_finished(&mut inner, id.clone(), entry);
        }
    }

    /// Processing to Completed; returns false if `id` was not processing
    pub fn complete(&self, id: &TaskId, chapters: Vec<ChapterRecord>) -> bool {
        self.finish(id, |entry| {
            entry.state = TaskState::Completed;
            entry.chapters = Some(Arc::new(chapters));
            entry.error = None;
        })
    }

    /// Processing to Failed; returns false if `id` was not processing
    pub fn fail(&self, id: &TaskId, error: impl Into<String>) -> bool {
        let error = error.into();
        self.finish(id, |entry| {
            entry.state = TaskState::Failed;
            entry.chapters = None;
            entry.error = Some(error);
        })
    }

    fn finish(&self, id: &TaskId, apply: impl FnOnce(&mut TaskEntry)) -> bool {
        let mut inner = self.lock();

        let Some(mut entry) = inner.processing.remove(id) else {
            return false;
        };

        apply(&mut entry);
        entry.updated_at = Utc::now();
        entry.finished_at = Some(Instant::now());

        self.retain_finished(&mut inner, id.clone(), entry);
        true
    }

    /// Record a finished task loaded from persistent storage
    ///
    /// Does nothing if `id` is already tracked. Returns the resulting status.
    pub fn insert_finished(&self, id: &TaskId, status: &TaskStatus) -> TaskStatus {
        let mut inner = self.lock();

        if let Some(entry) = inner.processing.get(id) {
            return entry.status(id);
        }
        if let Some(entry) = self.touch(&mut inner, id) {
            return entry.status(id);
        }
        if !matches!(status.state, TaskState::Completed | TaskState::Failed) {
            return TaskStatus::unknown(id.clone());
        }

        let entry = TaskEntry {
            source_url: status.source_url.clone().unwrap_or_default(),
            state: status.state,
            chapters: status.chapters.clone().map(Arc::new),
            error: status.error.clone(),
            updated_at: status.updated_at.unwrap_or_else(Utc::now),
            finished_at: Some(Instant::now()),
        };
        let snapshot = entry.status(id);
        self.retain_finished(&mut inner, id.clone(), entry);
        snapshot
    }

    /// Drop a finished task; processing tasks are left alone
    pub fn forget(&self, id: &TaskId) -> bool {
        self.lock()
            .finished
            .as_mut()
            .and_then(|f| f.pop(id))
            .is_some()
    }

    /// True while `id` is processing
    pub fn is_processing(&self, id: &TaskId) -> bool {
        self.lock().processing.contains_key(id)
    }

    /// Identifiers currently processing
    pub fn processing(&self) -> Vec<TaskId> {
        self.lock().processing.keys().cloned().collect()
    }

    /// Number of tracked tasks in any state
    pub fn len(&self) -> usize {
        let inner = self.lock();
        inner.processing.len() + inner.finished.as_ref().map_or(0, |f| f.len())
    }

    /// True when nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retain_finished(&self, inner: &mut Inner, id: TaskId, entry: TaskEntry) {
        let Some(finished) = inner.finished.as_mut() else {
            return;
        };

        if self.ttl.is_some() {
            let now = Instant::now();
            let expired: Vec<TaskId> = finished
                .iter()
                .filter(|(_, e)| self.expired(e, now))
                .map(|(id, _)| id.clone())
                .collect();
            for id in expired {
                finished.pop(&id);
            }
        }

        if let Some((evicted, _)) = finished.push(id.clone(), entry) {
            if evicted != id {
                tracing::debug!(task_id = %evicted, "evicting finished task from memory");
            }
        }
    }
}
