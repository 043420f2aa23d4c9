//! Chapter segmentation
//!
//! Turns a document outline into an ordered list of chapters in two steps:
//!
//! 1. [`resolve_spans`] maps outline entries to page spans. Consecutive
//!    chapters share their boundary page. A title seen before rolls the list
//!    back to its first occurrence, shrinks that occurrence to end just before
//!    the repeat, and then appends the repeat as a new chapter.
//! 2. [`Segmenter::describe`] asks the summarizer for a description of each
//!    surviving span, using at most `max_pages` pages and `max_chars`
//!    characters from the start of the chapter.
//!
//! Text beyond those caps never reaches the summarizer, so descriptions of
//! long chapters only reflect their opening.

use crate::config::SummaryConfig;
use crate::document::Document;
use crate::error::Result;
use crate::summarize::Summarizer;
use crate::types::{ChapterRecord, ChapterSpan, OutlineEntry};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolve outline entries into chapter page spans
///
/// Pages in the result are 0-indexed and inclusive. The first position a
/// title occupies is recorded once and never updated, so a title repeated
/// three or more times always rolls back to its very first occurrence. An
/// entry whose recorded position no longer exists after an earlier rollback
/// is appended without patching anything.
pub fn resolve_spans(outline: &[OutlineEntry], total_pages: usize) -> Vec<ChapterSpan> {
    let mut chapters: Vec<ChapterSpan> = Vec::with_capacity(outline.len());
    let mut first_seen: HashMap<&str, usize> = HashMap::new();

    for (i, entry) in outline.iter().enumerate() {
        let start_page = entry.start_page - 1;

        match first_seen.get(entry.title.as_str()) {
            Some(&prev) => {
                chapters.truncate(prev + 1);
                if let Some(first) = chapters.get_mut(prev) {
                    first.end_page = start_page - 1;
                }
            }
            None => {
                first_seen.insert(entry.title.as_str(), chapters.len());
            }
        }

        let end_page = match outline.get(i + 1) {
            Some(next) => next.start_page - 1,
            None => total_pages as i64 - 1,
        };

        chapters.push(ChapterSpan {
            title: entry.title.clone(),
            start_page,
            end_page,
        });
    }

    chapters
}

/// A resolved span paired with the text its description is built from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChapterDraft {
    /// Resolved page span
    pub span: ChapterSpan,
    /// Opening text of the chapter, already capped
    pub text: String,
}

/// Resolve spans and collect each chapter's opening text
///
/// Blocking: reads page text from `doc`. Pages outside the document are
/// skipped, so a span that lies entirely outside it gets empty text.
pub fn draft_chapters(
    doc: &dyn Document,
    outline: &[OutlineEntry],
    limits: &SummaryConfig,
) -> Result<Vec<ChapterDraft>> {
    resolve_spans(outline, doc.page_count())
        .into_iter()
        .map(|span| {
            let text = opening_text(doc, &span, limits)?;
            Ok(ChapterDraft { span, text })
        })
        .collect()
}

/// Text of the first `max_pages` pages of a span, cut to `max_chars` characters
pub fn opening_text(doc: &dyn Document, span: &ChapterSpan, limits: &SummaryConfig) -> Result<String> {
    let page_count = doc.page_count() as i64;
    let first = span.start_page.max(0);
    let last = span
        .end_page
        .min(page_count - 1)
        .min(span.start_page.saturating_add(limits.max_pages as i64 - 1));

    let mut text = String::new();
    let mut page = first;
    while page <= last {
        text.push_str(&doc.page_text(page as usize)?);
        if text.chars().count() >= limits.max_chars {
            break;
        }
        text.push('\n');
        page += 1;
    }

    Ok(truncate_chars(&text, limits.max_chars))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Generates chapter records from drafts using a summarizer
#[derive(Clone)]
pub struct Segmenter {
    summarizer: Arc<dyn Summarizer>,
    limits: SummaryConfig,
}

impl Segmenter {
    /// Create a segmenter
    pub fn new(summarizer: Arc<dyn Summarizer>, limits: SummaryConfig) -> Self {
        Self { summarizer, limits }
    }

    /// Summary limits in effect
    pub fn limits(&self) -> &SummaryConfig {
        &self.limits
    }

    /// Describe each draft in order
    ///
    /// Each description is built from the span as finally resolved. A first
    /// occurrence later shrunk by a repeated title is described from its
    /// shrunk range, not from the range it had before the repeat was seen;
    /// the two texts differ only when the original range held fewer than
    /// `max_chars` characters. Spans discarded by a rollback are never
    /// described.
    pub async fn describe(&self, drafts: Vec<ChapterDraft>) -> Result<Vec<ChapterRecord>> {
        let mut records = Vec::with_capacity(drafts.len());

        for ChapterDraft { span, text } in drafts {
            let description = self
                .summarizer
                .summarize(&text, self.limits.max_length, self.limits.min_length)
                .await?;

            records.push(ChapterRecord {
                title: span.title,
                description,
                start_page: span.start_page,
                end_page: span.end_page,
            });
        }

        Ok(records)
    }

    /// Segment a document in one call
    ///
    /// Reads page text on the current thread; async callers holding large
    /// documents should run [`draft_chapters`] on a blocking thread and call
    /// [`Segmenter::describe`] instead.
    pub async fn segment(
        &self,
        doc: &dyn Document,
        outline: &[OutlineEntry],
    ) -> Result<Vec<ChapterRecord>> {
        let drafts = draft_chapters(doc, outline, &self.limits)?;
        self.describe(drafts).await
    }
}
