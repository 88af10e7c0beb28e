//! Grounded question answering over your own documents.
//!
//! `ragkit` ingests documents (plain text or markup), splits them into
//! chunks, embeds and stores them, then answers questions strictly from the
//! most similar chunks. When nothing relevant is stored the answer is the
//! fixed [`REFUSAL_SENTENCE`].
//!
//! Every external capability sits behind a trait so backends can be swapped:
//!
//! - [`EmbeddingProvider`]: [`HashEmbeddingProvider`] (offline), Ollama and
//!   OpenAI-compatible APIs, or local fastembed models behind
//!   [`LazyEmbeddingProvider`]
//! - [`VectorStore`]: [`InMemoryVectorStore`], [`JsonFileVectorStore`],
//!   Qdrant, pgvector
//! - [`AnswerGenerator`]: Ollama or OpenAI-compatible chat APIs
//! - [`Chunker`]: [`SentenceChunker`], [`SlidingWindowChunker`]
//!
//! # Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `openai` | [`openai`] embeddings and chat (OpenAI, OpenRouter, ...) |
//! | `ollama` | [`ollama`] embeddings and chat |
//! | `qdrant` | [`qdrant`] vector store |
//! | `pgvector` | [`pgvector`] vector store |
//! | `local-embeddings` | [`local`] fastembed models |
//! | `full` | all of the above |
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragkit::{Document, HashEmbeddingProvider, JsonFileVectorStore, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::new(256)?))
//!     .vector_store(Arc::new(JsonFileVectorStore::new("./data/vector_store.json")))
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! pipeline.ensure_schema().await?;
//! pipeline.ingest(&Document::new(1, "<p>Dogs are mammals.</p>")).await?;
//! let answer = pipeline.ask("Are dogs mammals?").await?;
//! ```

pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod filestore;
pub mod generator;
pub mod hashing;
pub mod inmemory;
pub mod lazy;
pub mod normalize;
pub mod pipeline;
pub mod retriever;
pub mod telemetry;
pub mod vectorstore;

#[cfg(feature = "local-embeddings")]
pub mod local;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pgvector")]
pub mod pgvector;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{Chunker, SentenceChunker, SlidingWindowChunker};
pub use config::{ChunkingStrategy, RagConfig, RagConfigBuilder};
pub use context::ContextAssembler;
pub use document::{
    Answer, Chunk, Document, IngestReport, Metadata, MetadataValue, RetrievalMatch, ScoredChunk,
    TextFormat,
};
pub use embedding::{DirectionPrefixes, EmbedDirection, EmbeddingProvider};
pub use error::{RagError, Result};
pub use filestore::JsonFileVectorStore;
pub use generator::{AnswerGenerator, PromptTemplate, REFUSAL_SENTENCE};
pub use hashing::HashEmbeddingProvider;
pub use inmemory::InMemoryVectorStore;
pub use lazy::{EmbeddingProviderFactory, LazyEmbeddingProvider};
pub use normalize::normalize;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retriever::Retriever;
pub use vectorstore::{DistanceMetric, VectorStore};
