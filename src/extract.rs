//! Chapter sub-document materialization
//!
//! A chapter link names a cached source file and a 0-indexed inclusive page
//! range. The first request writes
//! `cache_dir/chapters/chapter_<start+1>_to_<end+1>_<file>`; later requests
//! for the same file and range reuse it. Concurrent first requests are
//! single-flighted per output path.

use crate::document::DocumentLoader;
use crate::error::{Error, Result};
use crate::types::PageRange;
use crate::utils::{KeyedLocks, remove_if_present, temp_sibling, validate_file_name};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Produces and caches page-range sub-documents
pub struct ChapterExtractor {
    source_dir: PathBuf,
    output_dir: PathBuf,
    loader: Arc<dyn DocumentLoader>,
    inflight: KeyedLocks<PathBuf>,
}

impl ChapterExtractor {
    /// Create an extractor reading from `source_dir` and writing to `output_dir`
    pub fn new(
        source_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        loader: Arc<dyn DocumentLoader>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            loader,
            inflight: KeyedLocks::new(),
        }
    }

    /// Output path for a file and range, whether or not it exists yet
    ///
    /// `None` when the range is reversed or starts before the first page.
    pub fn output_path(&self, file: &str, start: i64, end: i64) -> Option<PathBuf> {
        if start < 0 || end < start {
            return None;
        }
        // Both bounds are non-negative, so one-based numbering fits in u64
        let (first, last) = (start as u64 + 1, end as u64 + 1);
        Some(
            self.output_dir
                .join(format!("chapter_{first}_to_{last}_{file}")),
        )
    }

    /// Return the sub-document for `file` covering pages `start..=end`
    ///
    /// Fails with [`Error::SourceNotFound`] when `file` is not in the cache and
    /// [`Error::InvalidPageRange`] when the range does not fit the document.
    pub async fn materialize(&self, file: &str, start: i64, end: i64) -> Result<PathBuf> {
        let file = validate_file_name(file)?;
        let source = self.source_dir.join(file);
        if !tokio::fs::try_exists(&source).await? {
            return Err(Error::SourceNotFound(file.to_string()));
        }

        let Some(dest) = self.output_path(file, start, end) else {
            return Err(self.range_error(&source, start, end).await);
        };
        let _guard = self.inflight.lock(&dest).await;

        if tokio::fs::try_exists(&dest).await? {
            debug!(path = %dest.display(), "chapter document already materialized");
            return Ok(dest);
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let loader = self.loader.clone();
        let (src, out) = (source.clone(), dest.clone());
        tokio::task::spawn_blocking(move || write_range(loader.as_ref(), &src, start, end, &out))
            .await
            .map_err(|e| Error::Other(format!("extraction task failed: {e}")))??;

        info!(
            source = %source.display(),
            path = %dest.display(),
            start,
            end,
            "chapter document materialized"
        );
        Ok(dest)
    }
}

impl ChapterExtractor {
    /// Delete a cached source and every chapter document cut from it
    ///
    /// Returns the number of files removed. Missing files are not an error.
    pub async fn purge(&self, file: &str) -> Result<usize> {
        let file = validate_file_name(file)?;
        let mut removed = usize::from(remove_if_present(&self.source_dir.join(file)).await?);

        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if chapter_source(&name.to_string_lossy()) != Some(file) {
                continue;
            }
            let path = entry.path();
            let _guard = self.inflight.lock(&path).await;
            if remove_if_present(&path).await? {
                removed += 1;
            }
        }

        debug!(file, removed, "purged cached document");
        Ok(removed)
    }

    async fn range_error(&self, source: &Path, start: i64, end: i64) -> Error {
        let loader = self.loader.clone();
        let source = source.to_path_buf();
        let opened =
            tokio::task::spawn_blocking(move || loader.open(&source).map(|doc| doc.page_count()))
                .await;

        match opened {
            Ok(Ok(page_count)) => Error::InvalidPageRange {
                start,
                end,
                page_count,
            },
            Ok(Err(e)) => e,
            Err(e) => Error::Other(format!("extraction task failed: {e}")),
        }
    }
}

/// Source file name encoded in a chapter document name
fn chapter_source(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("chapter_")?;
    let (first, rest) = rest.split_once("_to_")?;
    let (last, file) = rest.split_once('_')?;
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    (numeric(first) && numeric(last)).then_some(file)
}

fn write_range(
    loader: &dyn DocumentLoader,
    source: &Path,
    start: i64,
    end: i64,
    dest: &Path,
) -> Result<()> {
    let page_count = loader.open(source)?.page_count();
    let range = PageRange::new(start, end, page_count)?;

    let tmp = temp_sibling(dest);
    if let Err(e) = loader.extract_range(source, range, &tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, dest)?;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, PdfLoader, blank_pdf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};

    struct CountingLoader {
        inner: PdfLoader,
        extractions: AtomicUsize,
    }

    impl DocumentLoader for CountingLoader {
        fn open(&self, path: &Path) -> Result<Box<dyn Document>> {
            self.inner.open(path)
        }

        fn extract_range(&self, source: &Path, range: PageRange, dest: &Path) -> Result<()> {
            self.extractions.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.inner.extract_range(source, range, dest)
        }
    }

    fn setup(pages: usize) -> (TempDir, Arc<CountingLoader>, ChapterExtractor) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("book.pdf"), blank_pdf(pages)).unwrap();
        let loader = Arc::new(CountingLoader {
            inner: PdfLoader::new(),
            extractions: AtomicUsize::new(0),
        });
        let extractor =
            ChapterExtractor::new(dir.path(), dir.path().join("chapters"), loader.clone());
        (dir, loader, extractor)
    }

    #[tokio::test]
    async fn writes_named_sub_document() {
        let (dir, _, extractor) = setup(10);

        let path = extractor.materialize("book.pdf", 2, 4).await.unwrap();

        assert_eq!(path, dir.path().join("chapters/chapter_3_to_5_book.pdf"));
        let part = PdfLoader::new().open(&path).unwrap();
        assert_eq!(part.page_count(), 3);
    }

    #[tokio::test]
    async fn concurrent_requests_extract_once() {
        let (_dir, loader, extractor) = setup(6);
        let extractor = Arc::new(extractor);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let extractor = extractor.clone();
                tokio::spawn(async move { extractor.materialize("book.pdf", 0, 2).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(loader.extractions.load(Ordering::SeqCst), 1);

        extractor.materialize("book.pdf", 0, 2).await.unwrap();
        assert_eq!(loader.extractions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_source_is_not_found() {
        let (_dir, _, extractor) = setup(2);

        let result = extractor.materialize("absent.pdf", 0, 1).await;
        assert!(matches!(result, Err(Error::SourceNotFound(f)) if f == "absent.pdf"));
    }

    #[tokio::test]
    async fn traversal_names_are_rejected() {
        let (_dir, _, extractor) = setup(2);

        let result = extractor.materialize("../book.pdf", 0, 1).await;
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[tokio::test]
    async fn out_of_range_pages_are_rejected_without_output() {
        let (_dir, loader, extractor) = setup(3);

        let result = extractor.materialize("book.pdf", 1, 7).await;

        assert!(matches!(
            result,
            Err(Error::InvalidPageRange { page_count: 3, .. })
        ));
        assert_eq!(loader.extractions.load(Ordering::SeqCst), 0);
        assert!(!extractor.output_path("book.pdf", 1, 7).unwrap().exists());
    }

    #[tokio::test]
    async fn extreme_page_numbers_are_rejected() {
        let (dir, loader, extractor) = setup(3);

        for (start, end) in [(i64::MAX, 0), (i64::MAX, i64::MAX), (-1, 1), (0, i64::MIN)] {
            let result = extractor.materialize("book.pdf", start, end).await;
            assert!(
                matches!(
                    result,
                    Err(Error::InvalidPageRange { page_count: 3, start: s, end: e })
                        if s == start && e == end
                ),
                "range {start}..={end} gave {result:?}"
            );
        }

        assert_eq!(loader.extractions.load(Ordering::SeqCst), 0);
        let written = std::fs::read_dir(dir.path().join("chapters"))
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn purge_removes_source_and_its_chapters_only() {
        let (dir, _, extractor) = setup(6);
        std::fs::write(dir.path().join("other.pdf"), blank_pdf(6)).unwrap();

        extractor.materialize("book.pdf", 0, 1).await.unwrap();
        extractor.materialize("book.pdf", 2, 5).await.unwrap();
        let kept = extractor.materialize("other.pdf", 0, 1).await.unwrap();
        let lookalike = dir.path().join("chapters/chapter_1_to_2_x_book.pdf");
        std::fs::write(&lookalike, b"not ours").unwrap();

        assert_eq!(extractor.purge("book.pdf").await.unwrap(), 3);

        assert!(!dir.path().join("book.pdf").exists());
        assert!(!extractor.output_path("book.pdf", 0, 1).unwrap().exists());
        assert!(!extractor.output_path("book.pdf", 2, 5).unwrap().exists());
        assert!(kept.exists());
        assert!(lookalike.exists());
        assert!(dir.path().join("other.pdf").exists());

        assert_eq!(extractor.purge("book.pdf").await.unwrap(), 0);
    }

    #[test]
    fn chapter_source_parses_generated_names() {
        assert_eq!(chapter_source("chapter_1_to_3_book.pdf"), Some("book.pdf"));
        assert_eq!(chapter_source("chapter_2_to_4_a_b.pdf"), Some("a_b.pdf"));
        assert_eq!(chapter_source("chapter_x_to_3_book.pdf"), None);
        assert_eq!(chapter_source("book.pdf"), None);
    }

    #[test]
    fn output_path_numbers_pages_from_one() {
        let (dir, _, extractor) = setup(1);

        assert_eq!(
            extractor.output_path("book.pdf", i64::MAX, i64::MAX).unwrap(),
            dir.path()
                .join("chapters/chapter_9223372036854775808_to_9223372036854775808_book.pdf")
        );
        assert!(extractor.output_path("book.pdf", 3, 2).is_none());
        assert!(extractor.output_path("book.pdf", -1, 2).is_none());
    }
}
