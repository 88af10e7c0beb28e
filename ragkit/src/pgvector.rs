//! pgvector (PostgreSQL) vector store backend.
//!
//! Provides [`PgVectorStore`] which implements [`VectorStore`] using
//! [sqlx](https://docs.rs/sqlx) with the
//! [pgvector](https://github.com/pgvector/pgvector) PostgreSQL extension.
//!
//! # Prerequisites
//!
//! PostgreSQL with the `pgvector` extension available. [`ensure_schema`]
//! runs `CREATE EXTENSION IF NOT EXISTS vector` itself, which needs the
//! corresponding privilege.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragkit::pgvector::PgVectorStore;
//!
//! let store = PgVectorStore::from_env("documents").await?;
//! store.ensure_schema(768, DistanceMetric::Cosine).await?;
//! store.upsert(&chunks).await?;
//! let results = store.search(&query_embedding, 5).await?;
//! ```
//!
//! [`ensure_schema`]: VectorStore::ensure_schema

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::document::{Chunk, Metadata, MetadataValue, ScoredChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::{DistanceMetric, VectorStore};

const BACKEND: &str = "pgvector";

/// A [`VectorStore`] backed by one PostgreSQL table with a `vector(n)` column.
///
/// Columns: `id`, `document_id`, `chunk_index`, `text`, `embedding`,
/// `metadata` (jsonb). Scores are reported in the metric's native
/// direction: cosine similarity (`1 - <=>`), Euclidean distance (`<->`),
/// or inner product (`-(<#>)`).
pub struct PgVectorStore {
    pool: PgPool,
    table: String,
    metric: DistanceMetric,
}

impl PgVectorStore {
    /// Connect to `database_url` and bind to `table` (prefixed with `rag_`).
    pub async fn new(database_url: &str, table: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(Self::map_err)?;
        Self::from_pool(pool, table)
    }

    /// Connect using the `DATABASE_URL` environment variable.
    pub async fn from_env(table: &str) -> Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| RagError::store(BACKEND, "DATABASE_URL environment variable not set"))?;
        Self::new(&url, table).await
    }

    /// Use an existing connection pool.
    pub fn from_pool(pool: PgPool, table: &str) -> Result<Self> {
        Ok(Self { pool, table: Self::sanitize_table_name(table)?, metric: DistanceMetric::Cosine })
    }

    /// Rank with `metric` instead of cosine.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// The sanitized table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn map_err(e: sqlx::Error) -> RagError {
        RagError::store(BACKEND, e.to_string())
    }

    /// Only allows alphanumeric characters and underscores.
    fn sanitize_table_name(name: &str) -> Result<String> {
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if sanitized.is_empty() {
            return Err(RagError::InvalidArgument("table name must not be empty".to_string()));
        }
        Ok(format!("rag_{}", sanitized.to_lowercase()))
    }

    /// pgvector's text input format: `[1,2,3]`.
    fn vector_literal(embedding: &[f32]) -> String {
        format!("[{}]", embedding.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","))
    }

    /// Ordering expression (ascending) and score expression for the metric.
    fn operators(metric: DistanceMetric) -> (&'static str, &'static str) {
        match metric {
            DistanceMetric::Cosine => {
                ("embedding <=> $1::vector", "1 - (embedding <=> $1::vector)")
            }
            DistanceMetric::Euclidean => ("embedding <-> $1::vector", "embedding <-> $1::vector"),
            DistanceMetric::DotProduct => {
                ("embedding <#> $1::vector", "(embedding <#> $1::vector) * -1")
            }
        }
    }

    async fn existing_dimensions(&self) -> Result<Option<i32>> {
        let row = sqlx::query(
            "SELECT a.atttypmod FROM pg_attribute a \
             WHERE a.attrelid = to_regclass($1) AND a.attname = 'embedding' AND NOT a.attisdropped",
        )
        .bind(&self.table)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::map_err)?;
        row.map(|r| r.try_get::<i32, _>("atttypmod")).transpose().map_err(Self::map_err)
    }

    fn to_scored_chunk(row: &PgRow) -> Result<ScoredChunk> {
        let metadata_value: serde_json::Value = row.try_get("metadata").map_err(Self::map_err)?;
        let metadata: Metadata = metadata_value
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| MetadataValue::from_json(v).map(|m| (k.clone(), m)))
                    .collect()
            })
            .unwrap_or_default();
        let index: i64 = row.try_get("chunk_index").map_err(Self::map_err)?;
        let score: f64 = row.try_get("score").map_err(Self::map_err)?;

        Ok(ScoredChunk {
            chunk: Chunk {
                id: row.try_get("id").map_err(Self::map_err)?,
                document_id: row.try_get("document_id").map_err(Self::map_err)?,
                index: usize::try_from(index).unwrap_or_default(),
                text: row.try_get("text").map_err(Self::map_err)?,
                embedding: Vec::new(),
                metadata,
            },
            score: score as f32,
        })
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn ensure_schema(&self, dimensions: usize, metric: DistanceMetric) -> Result<()> {
        if metric != self.metric {
            return Err(RagError::SchemaMismatch {
                backend: BACKEND.to_string(),
                message: format!("store ranks with {:?}, requested {metric:?}", self.metric),
            });
        }

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(Self::map_err)?;

        if let Some(existing) = self.existing_dimensions().await? {
            if existing != dimensions as i32 {
                return Err(RagError::SchemaMismatch {
                    backend: BACKEND.to_string(),
                    message: format!(
                        "table '{}' has dimension {existing}, requested {dimensions}",
                        self.table
                    ),
                });
            }
            debug!(table = %self.table, dimensions, "pgvector table exists");
            return Ok(());
        }

        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                id TEXT PRIMARY KEY, \
                document_id TEXT NOT NULL, \
                chunk_index BIGINT NOT NULL, \
                text TEXT NOT NULL, \
                embedding vector({dimensions}) NOT NULL, \
                metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb\
            )",
            self.table
        );
        sqlx::query(&create_sql).execute(&self.pool).await.map_err(Self::map_err)?;

        info!(table = %self.table, dimensions, ?metric, "created pgvector table");
        Ok(())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let upsert_sql = format!(
            "INSERT INTO {} (id, document_id, chunk_index, text, embedding, metadata) \
             VALUES ($1, $2, $3, $4, $5::vector, $6) \
             ON CONFLICT (id) DO UPDATE SET \
                document_id = EXCLUDED.document_id, \
                chunk_index = EXCLUDED.chunk_index, \
                text = EXCLUDED.text, \
                embedding = EXCLUDED.embedding, \
                metadata = EXCLUDED.metadata",
            self.table
        );

        let mut tx = self.pool.begin().await.map_err(Self::map_err)?;
        for chunk in chunks {
            let metadata: serde_json::Map<String, serde_json::Value> =
                chunk.metadata.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();

            sqlx::query(&upsert_sql)
                .bind(&chunk.id)
                .bind(&chunk.document_id)
                .bind(chunk.index as i64)
                .bind(&chunk.text)
                .bind(Self::vector_literal(&chunk.embedding))
                .bind(serde_json::Value::Object(metadata))
                .execute(&mut *tx)
                .await
                .map_err(Self::map_err)?;
        }
        tx.commit().await.map_err(Self::map_err)?;

        debug!(table = %self.table, count = chunks.len(), "upserted chunks to pgvector");
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let (order_by, score) = Self::operators(self.metric);
        let search_sql = format!(
            "SELECT id, document_id, chunk_index, text, metadata, {score} AS score \
             FROM {} ORDER BY {order_by} LIMIT $2",
            self.table
        );

        let rows = sqlx::query(&search_sql)
            .bind(Self::vector_literal(embedding))
            .bind(top_k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_err)?;

        rows.iter().map(Self::to_scored_chunk).collect()
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query(&format!("TRUNCATE {}", self.table))
            .execute(&self.pool)
            .await
            .map_err(Self::map_err)?;
        debug!(table = %self.table, "cleared pgvector table");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", self.table))
            .fetch_one(&self.pool)
            .await
            .map_err(Self::map_err)?;
        let n: i64 = row.try_get("n").map_err(Self::map_err)?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}
