//! Paginated document access
//!
//! The segmentation pipeline only needs three things from a document: its
//! page count, its embedded outline, and the text of individual pages.
//! [`Document`] captures that surface; [`DocumentLoader`] opens documents
//! from disk and writes page sub-ranges out as standalone files.
//!
//! [`PdfLoader`] is the production implementation. Tests substitute in-memory
//! documents so segmentation can run without real files.

mod pdf;

pub use pdf::{PdfDocument, PdfLoader};

#[cfg(test)]
pub(crate) use pdf::blank_pdf;

use crate::error::Result;
use crate::types::{OutlineEntry, PageRange};
use std::path::Path;

/// A loaded, paginated document
pub trait Document: Send + Sync {
    /// Total number of pages
    fn page_count(&self) -> usize;

    /// Embedded outline entries in document order
    ///
    /// A document without outline metadata returns an empty list.
    fn outline(&self) -> Vec<OutlineEntry>;

    /// Plain text of one page (0-indexed)
    fn page_text(&self, index: usize) -> Result<String>;
}

/// Opens documents and materializes page sub-ranges
pub trait DocumentLoader: Send + Sync {
    /// Load the document stored at `path`
    fn open(&self, path: &Path) -> Result<Box<dyn Document>>;

    /// Write a new document containing exactly `range` of `source` to `dest`
    fn extract_range(&self, source: &Path, range: PageRange, dest: &Path) -> Result<()>;
}
