//! JSON-file vector store.
//!
//! The fallback used when no external vector database is configured. All
//! records live in one pretty-printed JSON document:
//!
//! ```json
//! { "docs": [ { "id": "…", "document_id": "…", "chunk_index": 0,
//!               "text": "…", "embedding": [0.1, …], "metadata": { … } } ] }
//! ```
//!
//! The owning document id and the chunk index are stored next to `id` on each
//! record; `metadata` holds the chunk's metadata exactly as given. Files
//! written before those fields existed are read back through the
//! `document_id`/`chunk_index` metadata keys. The file (and its parent
//! directories) is created with an empty `docs` list on first use. Clones of
//! one store share a lock; separate instances pointing at the same path do not
//! coordinate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::document::{
    CHUNK_INDEX_KEY, Chunk, DOCUMENT_ID_KEY, Metadata, MetadataValue, ScoredChunk,
};
use crate::error::{RagError, Result};
use crate::vectorstore::{DistanceMetric, VectorStore};

const BACKEND: &str = "json_file";

/// Default store location, relative to the working directory.
pub const DEFAULT_STORE_PATH: &str = "./data/vector_store.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    docs: Vec<StoredRecord>,
}

impl StoreFile {
    fn dimensions(&self) -> Option<usize> {
        self.docs.first().map(|r| r.embedding.len())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk_index: Option<usize>,
    text: String,
    embedding: Vec<f32>,
    #[serde(default)]
    metadata: Metadata,
}

impl From<&Chunk> for StoredRecord {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            document_id: Some(chunk.document_id.clone()),
            chunk_index: Some(chunk.index),
            text: chunk.text.clone(),
            embedding: chunk.embedding.clone(),
            metadata: chunk.metadata.clone(),
        }
    }
}

impl StoredRecord {
    fn to_chunk(&self) -> Chunk {
        let document_id = self.document_id.clone().unwrap_or_else(|| {
            self.metadata.get(DOCUMENT_ID_KEY).map(|v| v.to_string()).unwrap_or_default()
        });
        let index = self.chunk_index.unwrap_or_else(|| {
            self.metadata
                .get(CHUNK_INDEX_KEY)
                .and_then(MetadataValue::as_i64)
                .and_then(|i| usize::try_from(i).ok())
                .unwrap_or_default()
        });
        Chunk {
            id: self.id.clone(),
            document_id,
            index,
            text: self.text.clone(),
            embedding: self.embedding.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// A [`VectorStore`] persisted as a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileVectorStore {
    path: PathBuf,
    metric: DistanceMetric,
    lock: Arc<Mutex<()>>,
}

impl JsonFileVectorStore {
    /// Create a store at `path` using cosine similarity. Nothing is touched on disk yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_metric(path, DistanceMetric::Cosine)
    }

    /// Create a store at `path` ranking with `metric`.
    pub fn with_metric(path: impl Into<PathBuf>, metric: DistanceMetric) -> Self {
        Self { path: path.into(), metric, lock: Arc::new(Mutex::new(())) }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, action: &str, e: impl std::fmt::Display) -> RagError {
        RagError::store(BACKEND, format!("failed to {action} {}: {e}", self.path.display()))
    }

    async fn ensure_file(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.path).await.map_err(|e| self.io_err("inspect", e))? {
            return Ok(());
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| self.io_err("create directory for", e))?;
        }
        debug!(path = %self.path.display(), "creating empty vector store file");
        self.save(&StoreFile::default()).await
    }

    async fn load(&self) -> Result<StoreFile> {
        self.ensure_file().await?;
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| self.io_err("read", e))?;
        serde_json::from_str(&raw).map_err(|e| self.io_err("parse", e))
    }

    async fn save(&self, file: &StoreFile) -> Result<()> {
        let raw = serde_json::to_string_pretty(file).map_err(|e| self.io_err("serialize", e))?;
        tokio::fs::write(&self.path, raw).await.map_err(|e| self.io_err("write", e))
    }
}

#[async_trait]
impl VectorStore for JsonFileVectorStore {
    async fn ensure_schema(&self, dimensions: usize, metric: DistanceMetric) -> Result<()> {
        if metric != self.metric {
            return Err(RagError::SchemaMismatch {
                backend: BACKEND.to_string(),
                message: format!("store uses {:?}, requested {metric:?}", self.metric),
            });
        }
        let _guard = self.lock.lock().await;
        let file = self.load().await?;
        if let Some(existing) = file.dimensions() {
            if existing != dimensions {
                return Err(RagError::SchemaMismatch {
                    backend: BACKEND.to_string(),
                    message: format!("store has dimension {existing}, requested {dimensions}"),
                });
            }
        }
        Ok(())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        let expected = file.dimensions().unwrap_or(chunks[0].embedding.len());
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != expected) {
            return Err(RagError::SchemaMismatch {
                backend: BACKEND.to_string(),
                message: format!(
                    "chunk '{}' has dimension {}, store expects {expected}",
                    bad.id,
                    bad.embedding.len()
                ),
            });
        }
        for chunk in chunks {
            let record = StoredRecord::from(chunk);
            match file.docs.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => file.docs.push(record),
            }
        }
        self.save(&file).await?;
        debug!(path = %self.path.display(), count = chunks.len(), "upserted chunks to json store");
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let file = {
            let _guard = self.lock.lock().await;
            self.load().await?
        };
        let mut scored: Vec<ScoredChunk> = file
            .docs
            .iter()
            .map(|record| ScoredChunk {
                chunk: record.to_chunk(),
                score: self.metric.score(embedding, &record.embedding),
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
        let _guard = self.lock.lock().await;
        self.ensure_file().await?;
        self.save(&StoreFile::default()).await
    }

    async fn count(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.docs.len())
    }
}
