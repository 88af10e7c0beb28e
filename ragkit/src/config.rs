//! Configuration for the RAG pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::vectorstore::DistanceMetric;

/// Default maximum chunk length in characters for sentence chunking.
pub const DEFAULT_MAX_CHUNK_LENGTH: usize = 1200;

/// Default number of matches retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Default number of chunk embeddings in flight during one ingest call.
pub const DEFAULT_EMBED_CONCURRENCY: usize = 4;

/// How normalized document text is split into chunks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Greedy packing of whole sentences up to `max_chunk_length`.
    #[default]
    Sentence,
    /// Fixed windows of `size` characters, each sharing `overlap` characters
    /// with the previous one.
    SlidingWindow {
        /// Window length in characters.
        size: usize,
        /// Characters shared between consecutive windows. Must be below `size`.
        overlap: usize,
    },
}

impl ChunkingStrategy {
    /// The window used by ingestion paths without sentence awareness.
    pub fn default_window() -> Self {
        Self::SlidingWindow { size: 800, overlap: 120 }
    }
}

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk length in characters (sentence strategy).
    pub max_chunk_length: usize,
    /// Chunk boundary policy.
    pub chunking: ChunkingStrategy,
    /// Number of matches retrieved when the caller does not pass one.
    pub top_k: usize,
    /// Upper bound on concurrent embedding calls within one ingest.
    pub embed_concurrency: usize,
    /// Similarity metric the vector store is created with.
    pub metric: DistanceMetric,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            max_chunk_length: DEFAULT_MAX_CHUNK_LENGTH,
            chunking: ChunkingStrategy::Sentence,
            top_k: DEFAULT_TOP_K,
            embed_concurrency: DEFAULT_EMBED_CONCURRENCY,
            metric: DistanceMetric::Cosine,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that all values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] if:
    /// - `max_chunk_length == 0`
    /// - `top_k == 0`
    /// - `embed_concurrency == 0`
    /// - a sliding window has `size == 0` or `overlap >= size`
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_length == 0 {
            return Err(RagError::InvalidArgument(
                "max_chunk_length must be greater than zero".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(RagError::InvalidArgument("top_k must be greater than zero".to_string()));
        }
        if self.embed_concurrency == 0 {
            return Err(RagError::InvalidArgument(
                "embed_concurrency must be greater than zero".to_string(),
            ));
        }
        if let ChunkingStrategy::SlidingWindow { size, overlap } = self.chunking {
            validate_window(size, overlap)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_window(size: usize, overlap: usize) -> Result<()> {
    if size == 0 {
        return Err(RagError::InvalidArgument("window size must be greater than zero".into()));
    }
    if overlap >= size {
        return Err(RagError::InvalidArgument(format!(
            "window overlap ({overlap}) must be less than window size ({size})"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk length in characters.
    pub fn max_chunk_length(mut self, length: usize) -> Self {
        self.config.max_chunk_length = length;
        self
    }

    /// Set the chunk boundary policy.
    pub fn chunking(mut self, strategy: ChunkingStrategy) -> Self {
        self.config.chunking = strategy;
        self
    }

    /// Set the default number of matches per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the cap on concurrent embedding calls during ingestion.
    pub fn embed_concurrency(mut self, cap: usize) -> Self {
        self.config.embed_concurrency = cap;
        self
    }

    /// Set the similarity metric.
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
