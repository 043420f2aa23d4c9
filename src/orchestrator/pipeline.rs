//! Job execution: fetch, outline, segment, describe.

use crate::config::{Config, SummaryConfig};
use crate::document::DocumentLoader;
use crate::error::{Error, Result};
use crate::fetch::DocumentCache;
use crate::outline::{HeadingDetector, resolve_outline};
use crate::segment::{Segmenter, draft_chapters};
use crate::summarize::Summarizer;
use crate::types::{ChapterRecord, TaskId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One unit of queued work
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Task the job produces a result for
    pub id: TaskId,
    /// Source document URL
    pub source_url: String,
}

/// Executes a job to completion
///
/// Implementations run on a worker after a concurrency permit is acquired and
/// may block for a long time. Errors and panics mark the task failed.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Produce the chapter list for `job`
    async fn run(&self, job: &Job) -> Result<Vec<ChapterRecord>>;
}

/// Production runner: cache the source, read its outline, segment and describe
pub struct ChapterPipeline {
    cache: Arc<DocumentCache>,
    loader: Arc<dyn DocumentLoader>,
    segmenter: Segmenter,
    heading_fallback: Option<HeadingDetector>,
}

impl ChapterPipeline {
    /// Assemble a pipeline from its collaborators
    pub fn new(
        config: &Config,
        cache: Arc<DocumentCache>,
        loader: Arc<dyn DocumentLoader>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            cache,
            loader,
            segmenter: Segmenter::new(summarizer, config.summary.clone()),
            heading_fallback: config.outline.heading_fallback.then(HeadingDetector::new),
        }
    }

    fn limits(&self) -> SummaryConfig {
        self.segmenter.limits().clone()
    }
}

#[async_trait]
impl JobRunner for ChapterPipeline {
    async fn run(&self, job: &Job) -> Result<Vec<ChapterRecord>> {
        let path = self.cache.ensure(&job.id, &job.source_url).await?;

        // Parsing and page text extraction are CPU bound
        let loader = self.loader.clone();
        let detector = self.heading_fallback.clone();
        let limits = self.limits();
        let drafts = tokio::task::spawn_blocking(move || {
            // An unreadable download must not satisfy the next resubmission
            let doc = loader.open(&path).inspect_err(|_| {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "failed to discard unreadable document");
                }
            })?;
            let outline = resolve_outline(doc.as_ref(), detector.as_ref())?;
            debug!(entries = outline.len(), pages = doc.page_count(), "outline loaded");
            draft_chapters(doc.as_ref(), &outline, &limits)
        })
        .await
        .map_err(|e| Error::Other(format!("document task failed: {e}")))??;

        let chapters = self.segmenter.describe(drafts).await?;
        info!(task_id = %job.id, chapters = chapters.len(), "segmentation complete");
        Ok(chapters)
    }
}
