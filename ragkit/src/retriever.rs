//! Query-time retrieval: embed the question, search, rank.

use std::sync::Arc;

use tracing::debug;

use crate::document::RetrievalMatch;
use crate::embedding::{EmbedDirection, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Turns a question into a ranked list of stored chunks.
///
/// No score threshold is applied: results are always returned best-first,
/// however weak. Deciding that weak matches carry no information is left to
/// the caller.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl Retriever {
    /// Create a retriever over the given provider and store.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { embedding_provider, vector_store }
    }

    /// Retrieve at most `k` matches for `question`, ranked from 1.
    ///
    /// Returns an empty `Vec` when the store holds nothing.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidArgument`] if `k == 0` (checked before any call)
    /// - [`RagError::EmptyInput`] if `question` is blank
    /// - provider or store errors, unchanged
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievalMatch>> {
        if k == 0 {
            return Err(RagError::InvalidArgument("k must be greater than zero".to_string()));
        }
        let embedding = self.embedding_provider.embed(question, EmbedDirection::Query).await?;
        let mut results = self.vector_store.search(&embedding, k).await?;

        // Backends already sort, but ranks must follow the metric even if one doesn't.
        let metric = self.vector_store.metric();
        metric.sort(&mut results);
        results.truncate(k);

        debug!(top_k = k, result_count = results.len(), ?metric, "retrieved matches");

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(i, r)| RetrievalMatch { chunk: r.chunk, score: r.score, rank: i + 1 })
            .collect())
    }
}
