//! In-memory vector store.
//!
//! This module provides [`InMemoryVectorStore`], a zero-dependency vector store
//! backed by a `Vec` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and small-scale use cases.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Chunk, ScoredChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::{DistanceMetric, VectorStore};

const BACKEND: &str = "in_memory";

/// An in-memory vector store with exhaustive search.
///
/// Records keep insertion order; upserting an existing id replaces the record
/// in place. All operations are async-safe via `tokio::sync::RwLock`.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.ensure_schema(384, DistanceMetric::Cosine).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    metric: DistanceMetric,
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    dimensions: Option<usize>,
    records: Vec<Chunk>,
    positions: HashMap<String, usize>,
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::with_metric(DistanceMetric::Cosine)
    }
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store using cosine similarity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store ranking with `metric`.
    pub fn with_metric(metric: DistanceMetric) -> Self {
        Self { metric, state: RwLock::new(State::default()) }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_schema(&self, dimensions: usize, metric: DistanceMetric) -> Result<()> {
        if metric != self.metric {
            return Err(RagError::SchemaMismatch {
                backend: BACKEND.to_string(),
                message: format!("store uses {:?}, requested {metric:?}", self.metric),
            });
        }
        let mut state = self.state.write().await;
        match state.dimensions {
            Some(existing) if existing != dimensions => Err(RagError::SchemaMismatch {
                backend: BACKEND.to_string(),
                message: format!("store has dimension {existing}, requested {dimensions}"),
            }),
            Some(_) => Ok(()),
            None => {
                state.dimensions = Some(dimensions);
                debug!(dimensions, ?metric, "in-memory schema set");
                Ok(())
            }
        }
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(dim) = state.dimensions {
            if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dim) {
                return Err(RagError::SchemaMismatch {
                    backend: BACKEND.to_string(),
                    message: format!(
                        "chunk '{}' has dimension {}, store expects {dim}",
                        bad.id,
                        bad.embedding.len()
                    ),
                });
            }
        }
        for chunk in chunks {
            match state.positions.get(&chunk.id).copied() {
                Some(pos) => state.records[pos] = chunk.clone(),
                None => {
                    let pos = state.records.len();
                    state.positions.insert(chunk.id.clone(), pos);
                    state.records.push(chunk.clone());
                }
            }
        }
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let state = self.state.read().await;
        let mut scored: Vec<ScoredChunk> = state
            .records
            .iter()
            .map(|chunk| ScoredChunk {
                chunk: chunk.clone(),
                score: self.metric.score(embedding, &chunk.embedding),
            })
            .collect();

        self.metric.sort(&mut scored);
        scored.truncate(top_k);
        Ok(scored)
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.records.clear();
        state.positions.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.state.read().await.records.len())
    }
}
