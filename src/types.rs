//! Core types for chapter-feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stable identifier of a task, derived from its source URL
///
/// The identifier is the lowercase hex MD5 digest of the trimmed source URL,
/// so repeated submissions of the same source collapse onto one task. The
/// cached copy of the source document is stored under the same name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Derive the task identifier for a source URL
    pub fn from_source(source_url: &str) -> Self {
        Self(format!("{:x}", md5::compute(source_url.trim().as_bytes())))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the cached source document for this task
    pub fn document_file_name(&self) -> String {
        format!("{}.pdf", self.0)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(crate::Error::InvalidParameter {
                name: "task_id".to_string(),
                reason: "expected 32 hexadecimal characters".to_string(),
            })
        }
    }
}

/// One bookmark in a document's embedded outline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OutlineEntry {
    /// Nesting depth (1 = top level)
    pub level: u32,
    /// Bookmark title
    pub title: String,
    /// First page of the entry, 1-indexed
    pub start_page: i64,
}

impl OutlineEntry {
    /// Create a new outline entry
    pub fn new(level: u32, title: impl Into<String>, start_page: i64) -> Self {
        Self {
            level,
            title: title.into(),
            start_page,
        }
    }
}

/// A resolved chapter boundary before its description is generated
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSpan {
    /// Chapter title
    pub title: String,
    /// First page, 0-indexed
    pub start_page: i64,
    /// Last page, 0-indexed and inclusive
    pub end_page: i64,
}

/// A finished chapter as exposed to clients
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChapterRecord {
    /// Chapter title
    pub title: String,
    /// Generated summary of the chapter's opening text
    pub description: String,
    /// First page, 0-indexed
    pub start_page: i64,
    /// Last page, 0-indexed and inclusive
    pub end_page: i64,
}

/// Validated 0-indexed inclusive page range
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct PageRange {
    /// First page, 0-indexed
    pub start: usize,
    /// Last page, 0-indexed and inclusive
    pub end: usize,
}

impl PageRange {
    /// Validate a requested range against a document's page count
    pub fn new(start: i64, end: i64, page_count: usize) -> crate::Result<Self> {
        let invalid = || crate::Error::InvalidPageRange {
            start,
            end,
            page_count,
        };

        if start < 0 || end < start {
            return Err(invalid());
        }
        let (start_idx, end_idx) = (start as usize, end as usize);
        if end_idx >= page_count {
            return Err(invalid());
        }

        Ok(Self {
            start: start_idx,
            end: end_idx,
        })
    }

    /// Number of pages covered by the range
    pub fn page_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Lifecycle state of a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// No record exists
    Unknown,
    /// A worker has been dispatched and has not yet stored a result
    Processing,
    /// A result is stored
    Completed,
    /// The job failed; resubmission is allowed
    Failed,
}

impl TaskState {
    /// Convert integer state code to TaskState enum
    pub fn from_i32(state: i32) -> Self {
        match state {
            1 => TaskState::Processing,
            2 => TaskState::Completed,
            3 => TaskState::Failed,
            _ => TaskState::Unknown,
        }
    }

    /// Convert TaskState enum to integer state code
    pub fn to_i32(&self) -> i32 {
        match self {
            TaskState::Unknown => 0,
            TaskState::Processing => 1,
            TaskState::Completed => 2,
            TaskState::Failed => 3,
        }
    }

    /// Lowercase name, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Unknown => "unknown",
            TaskState::Processing => "processing",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a task returned by submission and polling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskStatus {
    /// Task identifier
    pub task_id: TaskId,
    /// Current state
    pub state: TaskState,
    /// Source URL, when the task is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Chapter records, present only when completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Vec<ChapterRecord>>,
    /// Failure message, present only when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the task last changed state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskStatus {
    /// Status for an identifier with no record
    pub fn unknown(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: TaskState::Unknown,
            source_url: None,
            chapters: None,
            error: None,
            updated_at: None,
        }
    }
}

/// Worker pool statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QueueStats {
    /// Jobs waiting for a free worker
    pub queued: usize,
    /// Jobs currently executing
    pub active: usize,
    /// Maximum number of concurrently executing jobs
    pub max_concurrent: usize,
    /// Maximum number of jobs allowed to wait
    pub queue_capacity: usize,
    /// Task records currently held in memory
    pub tracked: usize,
}

/// Event emitted during the task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task accepted and waiting for a worker
    TaskQueued {
        /// Task identifier
        id: TaskId,
        /// Source URL
        url: String,
    },

    /// A worker picked the task up
    TaskStarted {
        /// Task identifier
        id: TaskId,
    },

    /// Task finished with a chapter list
    TaskCompleted {
        /// Task identifier
        id: TaskId,
        /// Number of chapters produced
        chapters: usize,
    },

    /// Task failed
    TaskFailed {
        /// Task identifier
        id: TaskId,
        /// Error message
        error: String,
    },

    /// Service is shutting down
    Shutdown,
}
