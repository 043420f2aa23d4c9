//! PDF documents backed by `lopdf` (structure, outline, page splitting)
//! and `pdf-extract` (page text)

use super::{Document, DocumentLoader};
use crate::error::{Error, Result};
use crate::types::{OutlineEntry, PageRange};
use std::path::Path;
use std::sync::OnceLock;

/// A PDF held in memory
///
/// Page text is extracted for the whole file on first use and cached, since
/// `pdf-extract` decodes every page in one pass anyway.
pub struct PdfDocument {
    raw: Vec<u8>,
    doc: lopdf::Document,
    page_count: usize,
    texts: OnceLock<std::result::Result<Vec<String>, String>>,
}

impl PdfDocument {
    /// Parse a PDF from its bytes
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self> {
        let doc = lopdf::Document::load_mem(&raw)
            .map_err(|e| Error::Document(format!("failed to parse PDF: {e}")))?;
        let page_count = doc.get_pages().len();

        Ok(Self {
            raw,
            doc,
            page_count,
            texts: OnceLock::new(),
        })
    }

    fn texts(&self) -> Result<&[String]> {
        let texts = self.texts.get_or_init(|| {
            pdf_extract::extract_text_from_mem_by_pages(&self.raw).map_err(|e| e.to_string())
        });
        match texts {
            Ok(pages) => Ok(pages),
            Err(msg) => Err(Error::Document(format!("text extraction failed: {msg}"))),
        }
    }
}

impl Document for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn outline(&self) -> Vec<OutlineEntry> {
        match self.doc.get_toc() {
            Ok(toc) => toc
                .toc
                .into_iter()
                .map(|entry| OutlineEntry::new(entry.level as u32, entry.title, entry.page as i64))
                .collect(),
            Err(e) => {
                // Missing /Outlines is the common case, not a failure
                tracing::debug!(error = %e, "document has no readable outline");
                Vec::new()
            }
        }
    }

    fn page_text(&self, index: usize) -> Result<String> {
        if index >= self.page_count {
            return Err(Error::InvalidPageRange {
                start: index as i64,
                end: index as i64,
                page_count: self.page_count,
            });
        }
        // pdf-extract may report fewer pages than the page tree for damaged files
        Ok(self.texts()?.get(index).cloned().unwrap_or_default())
    }
}

/// Loads PDFs from disk
#[derive(Clone, Debug, Default)]
pub struct PdfLoader;

impl PdfLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for PdfLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn Document>> {
        let raw = std::fs::read(path)?;
        Ok(Box::new(PdfDocument::from_bytes(raw)?))
    }

    fn extract_range(&self, source: &Path, range: PageRange, dest: &Path) -> Result<()> {
        let mut doc = lopdf::Document::load(source)
            .map_err(|e| Error::Document(format!("failed to parse PDF: {e}")))?;

        let page_count = doc.get_pages().len();
        if range.end >= page_count {
            return Err(Error::InvalidPageRange {
                start: range.start as i64,
                end: range.end as i64,
                page_count,
            });
        }

        // lopdf numbers pages from 1
        let keep = (range.start as u32 + 1)..=(range.end as u32 + 1);
        let drop: Vec<u32> = doc
            .get_pages()
            .keys()
            .copied()
            .filter(|n| !keep.contains(n))
            .collect();

        doc.delete_pages(&drop);
        doc.prune_objects();
        doc.renumber_objects();
        doc.compress();
        doc.save(dest)
            .map_err(|e| Error::Document(format!("failed to write {}: {e}", dest.display())))?;

        tracing::debug!(
            source = %source.display(),
            dest = %dest.display(),
            start = range.start,
            end = range.end,
            "extracted page range"
        );
        Ok(())
    }
}

/// Build a minimal PDF with `pages` blank pages, for tests
#[allow(clippy::expect_used)]
#[cfg(test)]
pub(crate) fn blank_pdf(pages: usize) -> Vec<u8> {
    use lopdf::{Object, Stream, dictionary};

    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Contents" => content_id,
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("in-memory save");
    out
}
