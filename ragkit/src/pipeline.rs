//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the ingest and ask workflows by composing
//! an [`EmbeddingProvider`], a [`VectorStore`], a [`Chunker`] and an
//! [`AnswerGenerator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ragkit::{Document, HashEmbeddingProvider, InMemoryVectorStore, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::new(256)?))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! pipeline.ensure_schema().await?;
//! pipeline.ingest(&Document::new("doc1", "Cats are mammals.")).await?;
//! let answer = pipeline.ask("Are cats mammals?").await?;
//! ```

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunking::{self, Chunker};
use crate::config::RagConfig;
use crate::context::ContextAssembler;
use crate::document::{
    Answer, CHUNK_INDEX_KEY, Chunk, Document, IngestReport, MetadataValue, RetrievalMatch,
};
use crate::embedding::{EmbedDirection, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generator::{AnswerGenerator, REFUSAL_SENTENCE};
use crate::normalize::normalize;
use crate::retriever::Retriever;
use crate::vectorstore::VectorStore;

/// The RAG pipeline orchestrator.
///
/// Ingestion: normalize → chunk → embed (document direction, bounded
/// concurrency) → one batched upsert. Asking: validate → retrieve (query
/// direction) → refuse without calling the generator if nothing came back →
/// assemble context → generate.
///
/// Re-ingesting a document id appends new chunks; earlier chunks stay until
/// [`clear`](RagPipeline::clear) is called. A failed ingest leaves anything
/// already written in place.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    generator: Arc<dyn AnswerGenerator>,
    assembler: ContextAssembler,
    retriever: Retriever,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Create the store's collection for this provider's dimension and the
    /// configured metric. Safe to call on every startup.
    ///
    /// # Errors
    ///
    /// Returns a wrapped [`RagError::SchemaMismatch`] if the store already
    /// exists with a different shape, or the store's connectivity error.
    pub async fn ensure_schema(&self) -> Result<()> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.ensure_schema(dimensions, self.config.metric).await.map_err(|e| {
            error!(dimensions, metric = ?self.config.metric, error = %e, "failed to ensure schema");
            RagError::wrap("ensure schema", e)
        })
    }

    /// Remove every stored chunk.
    pub async fn clear(&self) -> Result<()> {
        self.vector_store.clear().await.map_err(|e| {
            error!(error = %e, "failed to clear vector store");
            RagError::wrap("clear", e)
        })
    }

    /// Ingest a single document: normalize → chunk → embed → store.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyInput`] for a blank id, blank text, or text that
    ///   normalizes to nothing (before any external call)
    /// - [`RagError::Pipeline`] wrapping the embedding or store failure
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport> {
        if document.id.trim().is_empty() {
            return Err(RagError::empty("document id"));
        }
        if document.text.trim().is_empty() {
            return Err(RagError::empty("document text"));
        }
        let text = normalize(&document.text, document.format)?;
        let pieces = self.chunker.split(&text);

        let operation = format!("ingest '{}'", document.id);
        let embeddings = self.embed_pieces(&pieces).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            RagError::wrap(operation.clone(), e)
        })?;

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| {
                let mut metadata = document.metadata.clone();
                metadata.insert(CHUNK_INDEX_KEY.to_string(), MetadataValue::Integer(index as i64));
                Chunk {
                    id: Uuid::new_v4().to_string(),
                    document_id: document.id.clone(),
                    index,
                    text,
                    embedding,
                    metadata,
                }
            })
            .collect();

        self.vector_store.upsert(&chunks).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "upsert failed during ingestion");
            RagError::wrap(operation, e)
        })?;

        let chunk_count = chunks.len();
        info!(document.id = %document.id, chunk_count, "ingested document");

        Ok(IngestReport {
            success: true,
            chunk_count,
            chunk_ids: chunks.into_iter().map(|c| c.id).collect(),
        })
    }

    /// Ingest several documents in order, stopping at the first failure.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Result<Vec<IngestReport>> {
        let mut reports = Vec::with_capacity(documents.len());
        for document in documents {
            reports.push(self.ingest(document).await?);
        }
        Ok(reports)
    }

    /// Embed chunk texts with at most `embed_concurrency` calls in flight,
    /// keeping input order.
    async fn embed_pieces(&self, pieces: &[String]) -> Result<Vec<Vec<f32>>> {
        let provider = &self.embedding_provider;
        stream::iter(pieces)
            .map(|text| provider.embed(text, EmbedDirection::Document))
            .buffered(self.config.embed_concurrency)
            .try_collect()
            .await
    }

    /// Retrieve ranked matches without generating an answer, using the configured `top_k`.
    pub async fn search(&self, query: &str) -> Result<Vec<RetrievalMatch>> {
        self.search_with_top_k(query, self.config.top_k).await
    }

    /// Retrieve at most `top_k` ranked matches without generating an answer.
    ///
    /// # Errors
    ///
    /// Validation errors are returned as-is; provider and store failures are
    /// wrapped in [`RagError::Pipeline`].
    pub async fn search_with_top_k(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>> {
        validate_query(query, "query", top_k)?;
        let matches = self.retriever.retrieve(query, top_k).await.map_err(|e| {
            error!(top_k, error = %e, "search failed");
            RagError::wrap("search", e)
        })?;
        info!(top_k, result_count = matches.len(), "search completed");
        Ok(matches)
    }

    /// Answer a question using the configured `top_k`.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        self.ask_with_top_k(question, self.config.top_k).await
    }

    /// Answer a question from at most `top_k` retrieved chunks.
    ///
    /// When nothing is retrieved the answer is [`REFUSAL_SENTENCE`], the
    /// generator is not called, and `grounded` is `false`.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyInput`] for a blank question, [`RagError::InvalidArgument`]
    ///   for `top_k == 0` (before any external call)
    /// - [`RagError::Pipeline`] wrapping retrieval or generation failures;
    ///   a failed generation is never turned into the refusal sentence
    pub async fn ask_with_top_k(&self, question: &str, top_k: usize) -> Result<Answer> {
        validate_query(question, "question", top_k)?;

        let matches = self.retriever.retrieve(question, top_k).await.map_err(|e| {
            error!(top_k, error = %e, "retrieval failed");
            RagError::wrap("ask", e)
        })?;

        if matches.is_empty() {
            warn!(top_k, "no matches retrieved, refusing without generation");
            return Ok(Answer { answer: REFUSAL_SENTENCE.to_string(), matches, grounded: false });
        }

        let context = self.assembler.assemble(&matches);
        let answer = self.generator.generate(question, &context).await.map_err(|e| {
            error!(error = %e, "generation failed");
            RagError::wrap("ask", e)
        })?;

        info!(top_k, result_count = matches.len(), "question answered");
        Ok(Answer { answer, matches, grounded: true })
    }
}

fn validate_query(text: &str, what: &str, top_k: usize) -> Result<()> {
    if text.trim().is_empty() {
        return Err(RagError::empty(what));
    }
    if top_k == 0 {
        return Err(RagError::InvalidArgument("top_k must be greater than zero".to_string()));
    }
    Ok(())
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding provider, vector store and generator are required. The
/// config defaults to [`RagConfig::default`], the chunker to the one the
/// config describes, and the assembler to [`ContextAssembler::default`].
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .generator(Arc::new(generator))
///     .chunker(Arc::new(SlidingWindowChunker::new(800, 120)?)) // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    assembler: Option<ContextAssembler>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the chunker derived from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the context formatting.
    pub fn assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = Some(assembler);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] if a required field is missing
    /// or the config is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            RagError::InvalidArgument("embedding_provider is required".to_string())
        })?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::InvalidArgument("vector_store is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::InvalidArgument("generator is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::from(chunking::from_config(&config)?),
        };
        let retriever = Retriever::new(embedding_provider.clone(), vector_store.clone());

        Ok(RagPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            generator,
            assembler: self.assembler.unwrap_or_default(),
            retriever,
        })
    }
}
