//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`SentenceChunker`]: packs whole sentences greedily up to a maximum length
//! - [`SlidingWindowChunker`]: fixed-size character windows with overlap
//!
//! Lengths are counted in `char`s, so multi-byte text never splits inside a
//! code point.

use crate::config::{ChunkingStrategy, RagConfig, validate_window};
use crate::error::{RagError, Result};

/// A strategy for splitting normalized text into chunk texts.
///
/// Implementations return segments in document order and never return empty
/// or whitespace-only segments.
pub trait Chunker: Send + Sync {
    /// Split `text` into chunk texts. Empty input yields an empty `Vec`.
    fn split(&self, text: &str) -> Vec<String>;
}

/// Build the chunker described by a configuration.
///
/// # Errors
///
/// Returns [`RagError::InvalidArgument`] for a zero length or a bad window.
pub fn from_config(config: &RagConfig) -> Result<Box<dyn Chunker>> {
    match config.chunking {
        ChunkingStrategy::Sentence => Ok(Box::new(SentenceChunker::new(config.max_chunk_length)?)),
        ChunkingStrategy::SlidingWindow { size, overlap } => {
            Ok(Box::new(SlidingWindowChunker::new(size, overlap)?))
        }
    }
}

/// Packs sentences into chunks of at most `max_length` characters.
///
/// A sentence boundary is `.`, `?` or `!` followed by whitespace. Sentences
/// are joined with a single space. A sentence longer than `max_length` is
/// emitted whole as its own chunk rather than cut mid-word.
///
/// # Example
///
/// ```rust
/// use ragkit::SentenceChunker;
/// use ragkit::chunking::Chunker;
///
/// let chunker = SentenceChunker::new(1200).unwrap();
/// let chunks = chunker.split("Cats are mammals. Dogs are mammals too.");
/// assert_eq!(chunks, vec!["Cats are mammals. Dogs are mammals too."]);
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    max_length: usize,
}

impl SentenceChunker {
    /// Create a new `SentenceChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] if `max_length == 0`.
    pub fn new(max_length: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(RagError::InvalidArgument("max_length must be greater than zero".into()));
        }
        Ok(Self { max_length })
    }

    /// The configured upper bound.
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Chunker for SentenceChunker {
    fn split(&self, text: &str) -> Vec<String> {
        chunk_sentences(text, self.max_length)
    }
}

/// Split `text` into sentence-like segments.
///
/// Boundaries are whitespace runs that directly follow `.`, `?` or `!`; the
/// punctuation stays with the preceding segment. Blank segments are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c.is_whitespace() && matches!(prev, Some('.' | '?' | '!')) {
            segments.push(&text[start..i]);
            // Swallow the rest of the whitespace run.
            let mut end = i + c.len_utf8();
            while let Some(&(j, w)) = chars.peek() {
                if !w.is_whitespace() {
                    break;
                }
                end = j + w.len_utf8();
                chars.next();
            }
            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }
    if start < text.len() {
        segments.push(&text[start..]);
    }

    segments.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Greedily pack sentences into chunks of at most `max_length` characters.
///
/// Whenever appending the next sentence (plus a joining space) would exceed
/// the limit, the current buffer is flushed and the sentence starts a new one.
pub fn chunk_sentences(text: &str, max_length: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();
        if current.is_empty() {
            current.push_str(sentence);
            current_len = sentence_len;
        } else if current_len + 1 + sentence_len > max_length {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = sentence_len;
        } else {
            current.push(' ');
            current.push_str(sentence);
            current_len += 1 + sentence_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Splits text into overlapping windows of a fixed character count.
///
/// Windows start every `size - overlap` characters. Every window is exactly
/// `size` characters except possibly the last, and the sequence stops at the
/// first window that reaches the end of the text.
#[derive(Debug, Clone)]
pub struct SlidingWindowChunker {
    size: usize,
    overlap: usize,
}

impl SlidingWindowChunker {
    /// Create a new `SlidingWindowChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] if `size == 0` or `overlap >= size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        validate_window(size, overlap)?;
        Ok(Self { size, overlap })
    }
}

impl Chunker for SlidingWindowChunker {
    fn split(&self, text: &str) -> Vec<String> {
        windows(text, self.size, self.overlap)
            .into_iter()
            .filter(|w| !w.trim().is_empty())
            .collect()
    }
}

/// Produce overlapping windows of `size` characters covering all of `text`.
///
/// # Errors
///
/// Returns [`RagError::InvalidArgument`] if `size == 0` or `overlap >= size`.
pub fn sliding_window(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    validate_window(size, overlap)?;
    Ok(windows(text, size, overlap))
}

fn windows(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = size - overlap;
    let mut out = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    out
}
