use super::Summarizer;
use crate::error::Result;
use async_trait::async_trait;

/// Summarizes by keeping the leading sentences of the text
///
/// Sentences are taken in order until `min_length` words are collected; the
/// result is then cut to `max_length` words. Whitespace is normalized first,
/// since extracted PDF text is full of hard line breaks.
#[derive(Clone, Debug, Default)]
pub struct ExtractiveSummarizer;

impl ExtractiveSummarizer {
    /// Create a new extractive summarizer
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core, shared with callers that are not async
    pub fn summarize_text(text: &str, max_length: usize, min_length: usize) -> String {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() || max_length == 0 {
            return String::new();
        }

        let mut words: Vec<&str> = Vec::new();
        for sentence in split_sentences(&normalized) {
            if words.len() >= min_length.max(1) {
                break;
            }
            words.extend(sentence.split_whitespace());
        }

        if words.len() > max_length {
            words.truncate(max_length);
            let mut out = words.join(" ");
            out.push_str("...");
            out
        } else {
            words.join(" ")
        }
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, text: &str, max_length: usize, min_length: usize) -> Result<String> {
        Ok(Self::summarize_text(text, max_length, min_length))
    }
}

/// Split after `.`, `!` or `?` when followed by whitespace
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace())
        {
            let end = i + c.len_utf8();
            sentences.push(text[start..end].trim());
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}
