//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Which side of retrieval a text is embedded for.
///
/// Asymmetric models embed stored passages and search queries differently,
/// so ingestion always uses [`Document`](EmbedDirection::Document) and
/// retrieval always uses [`Query`](EmbedDirection::Query).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EmbedDirection {
    /// A chunk being stored.
    Document,
    /// A question being searched for.
    Query,
}

impl EmbedDirection {
    /// Stable lowercase name, used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Query => "query",
        }
    }
}

/// Per-direction text prepended before embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DirectionPrefixes {
    /// Prefix for [`EmbedDirection::Document`].
    pub document: String,
    /// Prefix for [`EmbedDirection::Query`].
    pub query: String,
}

impl DirectionPrefixes {
    /// No framing; for symmetric models.
    pub fn none() -> Self {
        Self::default()
    }

    /// `search_document: ` / `search_query: ` (nomic-embed-text).
    pub fn nomic() -> Self {
        Self { document: "search_document: ".into(), query: "search_query: ".into() }
    }

    /// `passage: ` / `query: ` (E5 family).
    pub fn e5() -> Self {
        Self { document: "passage: ".into(), query: "query: ".into() }
    }

    /// Frame `text` for the given direction.
    pub fn apply(&self, text: &str, direction: EmbedDirection) -> String {
        let prefix = match direction {
            EmbedDirection::Document => &self.document,
            EmbedDirection::Query => &self.query,
        };
        format!("{prefix}{text}")
    }
}

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Ollama, OpenAI, a local
/// model, ...) behind a unified async interface. The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) implementation calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends that support
/// native batching should override it.
///
/// Implementations must reject blank text with [`RagError::EmptyInput`] in
/// both directions (see [`ensure_not_blank`]).
///
/// # Example
///
/// ```rust,ignore
/// use ragkit::{EmbedDirection, EmbeddingProvider};
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world", EmbedDirection::Query).await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str, direction: EmbedDirection) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input.
    async fn embed_batch(
        &self,
        texts: &[&str],
        direction: EmbedDirection,
    ) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text, direction).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Fail with [`RagError::EmptyInput`] if `text` is empty after trimming.
pub fn ensure_not_blank(text: &str, direction: EmbedDirection) -> Result<()> {
    if text.trim().is_empty() {
        return Err(RagError::empty(format!("{} text to embed", direction.as_str())));
    }
    Ok(())
}

/// Check that a provider returned a vector of the advertised length.
pub(crate) fn check_dimensions(provider: &str, expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(RagError::provider(
            provider,
            format!("expected {expected}-dimensional embedding, got {}", vector.len()),
        ));
    }
    Ok(())
}
