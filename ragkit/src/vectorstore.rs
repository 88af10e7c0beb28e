//! Vector store trait for storing and searching vector embeddings.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, ScoredChunk};
use crate::error::Result;

/// The similarity metric a store ranks with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity; higher is better.
    #[default]
    Cosine,
    /// Euclidean (L2) distance; lower is better.
    Euclidean,
    /// Inner product; higher is better.
    DotProduct,
}

impl DistanceMetric {
    /// `true` when larger scores mean more similar.
    pub fn higher_is_better(self) -> bool {
        !matches!(self, Self::Euclidean)
    }

    /// Score `candidate` against `query` in this metric's native units.
    pub fn score(self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(query, candidate),
            Self::Euclidean => euclidean_distance(query, candidate),
            Self::DotProduct => dot(query, candidate),
        }
    }

    /// Order two scores best-first. NaN sorts last.
    pub fn compare(self, a: f32, b: f32) -> Ordering {
        let ord = if self.higher_is_better() { b.partial_cmp(&a) } else { a.partial_cmp(&b) };
        ord.unwrap_or_else(|| match (a.is_nan(), b.is_nan()) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => Ordering::Equal,
        })
    }

    /// Stable best-first sort.
    pub fn sort(self, results: &mut [ScoredChunk]) {
        results.sort_by(|a, b| self.compare(a.score, b.score));
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

/// Compute the Euclidean distance between two vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

/// A storage backend for vector embeddings with similarity search.
///
/// A store is bound to one collection (table, file, ...) at construction.
/// Records are keyed by chunk id: upserting an existing id overwrites it.
/// Connectivity failures surface as
/// [`RagError::StoreUnavailable`](crate::RagError::StoreUnavailable) and are
/// not retried.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.ensure_schema(384, DistanceMetric::Cosine).await?;
/// store.upsert(&chunks).await?;
/// let results = store.search(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if absent; no-op if present with the same schema.
    ///
    /// Fails with [`RagError::SchemaMismatch`](crate::RagError::SchemaMismatch)
    /// if it exists with a different dimension or metric.
    async fn ensure_schema(&self, dimensions: usize, metric: DistanceMetric) -> Result<()>;

    /// Upsert chunks in one batch. Chunks must have embeddings set.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()>;

    /// Return at most `top_k` chunks, most similar first in [`metric`](VectorStore::metric) order.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>>;

    /// The metric `search` scores with.
    fn metric(&self) -> DistanceMetric;

    /// Remove every record, keeping the schema.
    async fn clear(&self) -> Result<()>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;
}
