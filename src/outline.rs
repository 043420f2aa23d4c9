//! Outline selection and heading-based fallback detection
//!
//! Chapter boundaries come from the document's embedded outline. Only when a
//! document carries no outline at all, and fallback is enabled, does
//! [`HeadingDetector`] scan page text for lines that look like chapter
//! headings and synthesize outline entries from them.

use crate::document::Document;
use crate::error::Result;
use crate::types::OutlineEntry;
use regex::Regex;
use tracing::{debug, warn};

/// Lines examined at the top of each page
const LINES_PER_PAGE: usize = 3;

/// Headings longer than this are treated as body text
const MAX_HEADING_WORDS: usize = 10;

/// Pick the outline used for segmentation
///
/// The embedded outline always wins. `fallback` is consulted only when the
/// embedded outline is empty.
pub fn resolve_outline(
    doc: &dyn Document,
    fallback: Option<&HeadingDetector>,
) -> Result<Vec<OutlineEntry>> {
    let embedded = doc.outline();
    if !embedded.is_empty() {
        return Ok(embedded);
    }

    match fallback {
        Some(detector) => {
            let detected = detector.detect(doc)?;
            debug!(headings = detected.len(), "outline synthesized from page headings");
            Ok(detected)
        }
        None => Ok(embedded),
    }
}

/// Detects chapter headings in page text
///
/// A page contributes at most one entry: the first of its leading lines that
/// looks like a heading. Recognized forms are `Chapter N`, `Part N` (arabic or
/// roman), `Section N`, dotted numbering followed by words (`2.1 Methods`),
/// and short all-uppercase lines.
#[derive(Debug, Clone)]
pub struct HeadingDetector {
    patterns: Vec<(Regex, HeadingLevel)>,
}

#[derive(Debug, Clone, Copy)]
enum HeadingLevel {
    Fixed(u32),
    // Depth follows the number of dotted components
    Numbered,
}

impl Default for HeadingDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadingDetector {
    /// Create a detector with the built-in heading patterns
    pub fn new() -> Self {
        let specs = [
            (r"(?i)^(chapter|part)\s+(\d+|[ivxlcdm]+)\b", HeadingLevel::Fixed(1)),
            (r"(?i)^section\s+\d+(\.\d+)*\b", HeadingLevel::Fixed(2)),
            (r"^\d+(\.\d+)*\.?\s+\p{L}", HeadingLevel::Numbered),
        ];

        let patterns = specs
            .into_iter()
            .filter_map(|(pattern, level)| {
                regex::RegexBuilder::new(pattern)
                    .size_limit(1024 * 1024)
                    .build()
                    .map_err(|e| warn!(pattern, error = %e, "invalid heading pattern"))
                    .ok()
                    .map(|re| (re, level))
            })
            .collect();

        Self { patterns }
    }

    /// Classify a single line, returning its outline level if it is a heading
    pub fn heading_level(&self, line: &str) -> Option<u32> {
        let line = line.trim();
        let words = line.split_whitespace().count();
        if words == 0 || words > MAX_HEADING_WORDS {
            return None;
        }

        for (re, level) in &self.patterns {
            if re.is_match(line) {
                return Some(match level {
                    HeadingLevel::Fixed(n) => *n,
                    HeadingLevel::Numbered => numbering_depth(line),
                });
            }
        }

        if is_shouting(line) { Some(1) } else { None }
    }

    /// Scan every page and build outline entries (1-indexed pages)
    pub fn detect(&self, doc: &dyn Document) -> Result<Vec<OutlineEntry>> {
        let mut entries = Vec::new();

        for index in 0..doc.page_count() {
            let text = doc.page_text(index)?;
            let heading = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .take(LINES_PER_PAGE)
                .find_map(|line| self.heading_level(line).map(|level| (level, line)));

            if let Some((level, title)) = heading {
                entries.push(OutlineEntry::new(level, title, index as i64 + 1));
            }
        }

        Ok(entries)
    }
}

fn numbering_depth(line: &str) -> u32 {
    let number = line.split_whitespace().next().unwrap_or_default();
    number.trim_end_matches('.').split('.').count() as u32
}

// All letters uppercase, with enough letters to rule out stray initials
fn is_shouting(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
}
