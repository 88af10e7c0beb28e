//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragkit::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::from_env("knowledge_base")?;
//! store.ensure_schema(768, DistanceMetric::Cosine).await?;
//! store.upsert(&chunks).await?;
//! let results = store.search(&query_embedding, 5).await?;
//! ```

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, info};

use crate::document::{
    CHUNK_INDEX_KEY, Chunk, DOCUMENT_ID_KEY, Metadata, MetadataValue, ScoredChunk,
};
use crate::error::{RagError, Result};
use crate::vectorstore::{DistanceMetric, VectorStore};

const BACKEND: &str = "qdrant";

/// Default gRPC address of a local Qdrant.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// A [`VectorStore`] backed by one [Qdrant](https://qdrant.tech/) collection.
///
/// Each chunk becomes a point keyed by its id, with payload
/// `{document_id, text, chunk_index, metadata}`. Scores come back in the
/// collection's native units: similarity for cosine and dot product,
/// distance for Euclidean.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    metric: DistanceMetric,
}

impl QdrantVectorStore {
    /// Connect to `url` and bind to `collection`, ranking by cosine similarity.
    pub fn new(url: &str, collection: impl Into<String>) -> Result<Self> {
        Self::connect(url, None, collection)
    }

    /// Connect with an API key (Qdrant Cloud).
    pub fn with_api_key(
        url: &str,
        api_key: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self> {
        Self::connect(url, Some(api_key.into()), collection)
    }

    /// Read `QDRANT_URL` (default `http://localhost:6334`) and the optional
    /// `QDRANT_API_KEY`.
    pub fn from_env(collection: impl Into<String>) -> Result<Self> {
        let url = std::env::var("QDRANT_URL").unwrap_or_else(|_| DEFAULT_QDRANT_URL.to_string());
        let api_key = std::env::var("QDRANT_API_KEY").ok().filter(|k| !k.is_empty());
        Self::connect(&url, api_key, collection)
    }

    /// Wrap an existing client.
    pub fn from_client(client: Qdrant, collection: impl Into<String>) -> Self {
        Self { client, collection: collection.into(), metric: DistanceMetric::Cosine }
    }

    /// Rank with `metric` instead of cosine.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// The bound collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn connect(url: &str, api_key: Option<String>, collection: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url).api_key(api_key).build().map_err(Self::map_err)?;
        Ok(Self::from_client(client, collection))
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::store(BACKEND, e.to_string())
    }

    fn mismatch(message: String) -> RagError {
        RagError::SchemaMismatch { backend: BACKEND.to_string(), message }
    }

    fn distance(metric: DistanceMetric) -> Distance {
        match metric {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Euclidean => Distance::Euclid,
            DistanceMetric::DotProduct => Distance::Dot,
        }
    }

    async fn validate_existing(&self, dimensions: usize, metric: DistanceMetric) -> Result<()> {
        let info = self
            .client
            .collection_info(self.collection.as_str())
            .await
            .map_err(Self::map_err)?;
        let params = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        match params {
            Some(VectorsConfigKind::Params(params)) => {
                if params.size != dimensions as u64 {
                    return Err(Self::mismatch(format!(
                        "collection '{}' has dimension {}, requested {dimensions}",
                        self.collection, params.size
                    )));
                }
                if params.distance != Self::distance(metric) as i32 {
                    return Err(Self::mismatch(format!(
                        "collection '{}' uses distance {:?}, requested {metric:?}",
                        self.collection,
                        Distance::try_from(params.distance).unwrap_or(Distance::UnknownDistance)
                    )));
                }
                Ok(())
            }
            _ => Err(Self::mismatch(format!(
                "collection '{}' does not use a single unnamed vector",
                self.collection
            ))),
        }
    }

    fn payload_for(chunk: &Chunk) -> Result<Payload> {
        let metadata: serde_json::Map<String, serde_json::Value> =
            chunk.metadata.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
        let payload = serde_json::json!({
            DOCUMENT_ID_KEY: chunk.document_id,
            "text": chunk.text,
            CHUNK_INDEX_KEY: chunk.index,
            "metadata": metadata,
        });
        Payload::try_from(payload).map_err(Self::map_err)
    }

    fn scalar(value: &QdrantValue) -> Option<MetadataValue> {
        match value.kind.as_ref()? {
            Kind::BoolValue(b) => Some(MetadataValue::Bool(*b)),
            Kind::IntegerValue(n) => Some(MetadataValue::Integer(*n)),
            Kind::DoubleValue(f) => Some(MetadataValue::Float(*f)),
            Kind::StringValue(s) => Some(MetadataValue::String(s.clone())),
            _ => None,
        }
    }

    fn to_scored_chunk(point: ScoredPoint) -> ScoredChunk {
        let id = point
            .id
            .as_ref()
            .and_then(|pid| match &pid.point_id_options {
                Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
                Some(PointIdOptions::Num(n)) => Some(n.to_string()),
                None => None,
            })
            .unwrap_or_default();
        let payload = &point.payload;
        let string = |key: &str| {
            payload.get(key).and_then(Self::scalar).map(|v| v.to_string()).unwrap_or_default()
        };
        let index = payload
            .get(CHUNK_INDEX_KEY)
            .and_then(Self::scalar)
            .and_then(|v| v.as_i64())
            .and_then(|i| usize::try_from(i).ok())
            .unwrap_or_default();
        let metadata: Metadata = payload
            .get("metadata")
            .and_then(|v| match &v.kind {
                Some(Kind::StructValue(s)) => Some(
                    s.fields
                        .iter()
                        .filter_map(|(k, v)| Self::scalar(v).map(|m| (k.clone(), m)))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default();

        ScoredChunk {
            chunk: Chunk {
                id,
                document_id: string(DOCUMENT_ID_KEY),
                index,
                text: string("text"),
                embedding: Vec::new(),
                metadata,
            },
            score: point.score,
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_schema(&self, dimensions: usize, metric: DistanceMetric) -> Result<()> {
        if metric != self.metric {
            return Err(Self::mismatch(format!(
                "store ranks with {:?}, requested {metric:?}",
                self.metric
            )));
        }
        let exists =
            self.client.collection_exists(self.collection.as_str()).await.map_err(Self::map_err)?;
        if exists {
            debug!(collection = %self.collection, "qdrant collection exists, validating");
            return self.validate_existing(dimensions, metric).await;
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(dimensions as u64, Self::distance(metric)),
                ),
            )
            .await
            .map_err(Self::map_err)?;

        info!(collection = %self.collection, dimensions, ?metric, "created qdrant collection");
        Ok(())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points = chunks
            .iter()
            .map(|chunk| {
                Ok(PointStruct::new(
                    chunk.id.clone(),
                    chunk.embedding.clone(),
                    Self::payload_for(chunk)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, count = chunks.len(), "upserted chunks to qdrant");
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, embedding.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(Self::map_err)?;

        Ok(response.result.into_iter().map(Self::to_scored_chunk).collect())
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn clear(&self) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection).points(Filter::default()).wait(true),
            )
            .await
            .map_err(Self::map_err)?;
        debug!(collection = %self.collection, "cleared qdrant collection");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(Self::map_err)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or_default())
    }
}

