use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const DEFAULT_CHUNK_SIZE: usize = 200;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// One window of a document's text, positioned by word-based windowing.
///
/// `start_offset`/`end_offset` are byte offsets into the original text so
/// callers can map a chunk back to its source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub doc_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Splits raw document text into overlapping word windows.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// The overlap must be strictly smaller than the chunk size, otherwise
    /// the window would never advance.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, EngineError> {
        if chunk_size == 0 {
            return Err(EngineError::validation("chunk size must be positive"));
        }
        if overlap >= chunk_size {
            return Err(EngineError::validation(format!(
                "overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn chunk(&self, doc_id: &str, text: &str) -> Vec<TextChunk> {
        let words = word_spans(text);
        if words.is_empty() {
            return vec![];
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < words.len() {
            let end = usize::min(start + self.chunk_size, words.len());
            let (first_start, _) = words[start];
            let (_, last_end) = words[end - 1];
            chunks.push(TextChunk {
                doc_id: doc_id.to_string(),
                chunk_index: chunks.len(),
                text: text[first_start..last_end].to_string(),
                start_offset: first_start,
                end_offset: last_end,
            });
            if end == words.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Byte ranges of whitespace-separated words, in document order.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}
