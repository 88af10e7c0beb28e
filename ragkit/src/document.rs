//! Data types for documents, chunks, and retrieval matches.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata key holding a chunk's position within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// Metadata key some backends use to carry the owning document id.
pub const DOCUMENT_ID_KEY: &str = "document_id";

/// A scalar metadata value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean flag.
    Bool(bool),
    /// Whole number.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Free text (tenant tags, titles, ...).
    String(String),
}

impl MetadataValue {
    /// Return the value as a string slice if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the value as an integer if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert a JSON value, keeping only scalars.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                n.as_i64().map(Self::Integer).or_else(|| n.as_f64().map(Self::Float))
            }
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }

    /// Convert into a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(n) => serde_json::Value::from(*n),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Metadata attached to documents and chunks.
pub type Metadata = HashMap<String, MetadataValue>;

/// How the raw text of a [`Document`] should be interpreted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    /// Treat as markup when the trimmed text starts with `<`.
    #[default]
    Auto,
    /// Plain text; only whitespace is normalized.
    Plain,
    /// HTML or XML-like markup; tags, scripts and styles are stripped.
    Markup,
}

/// A source document supplied at ingest time.
///
/// Documents are never stored as a unit; the pipeline decomposes them into
/// [`Chunk`]s.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Caller-supplied identifier (numeric ids are stored in their string form).
    pub id: String,
    /// Raw text or markup.
    pub text: String,
    /// Key-value metadata copied onto every chunk.
    #[serde(default)]
    pub metadata: Metadata,
    /// How `text` should be normalized.
    #[serde(default)]
    pub format: TextFormat,
}

impl Document {
    /// Create a document with no metadata and automatic format detection.
    pub fn new(id: impl ToString, text: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            text: text.into(),
            metadata: Metadata::new(),
            format: TextFormat::Auto,
        }
    }

    /// Attach one metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Override format detection.
    pub fn with_format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }
}

/// A segment of a [`Document`] with its vector embedding.
///
/// Chunks are immutable once written to a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Generated unique identifier (UUID v4).
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of this chunk within its document, starting at 0.
    pub index: usize,
    /// Normalized text content.
    pub text: String,
    /// The vector embedding for this chunk's text. Empty when read back from
    /// backends that do not return vectors.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Document metadata plus [`CHUNK_INDEX_KEY`].
    #[serde(default)]
    pub metadata: Metadata,
}

/// A chunk returned by a vector store together with its native score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Similarity or distance, in the store's metric.
    pub score: f32,
}

/// A ranked retrieval result for one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalMatch {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Similarity or distance, in the store's metric.
    pub score: f32,
    /// 1-based position in the ranking.
    pub rank: usize,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    /// Always `true` for a returned report; failures are returned as errors.
    pub success: bool,
    /// Number of chunks written.
    pub chunk_count: usize,
    /// Ids of the written chunks, in document order.
    pub chunk_ids: Vec<String>,
}

/// The result of asking a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The generated answer, or the refusal sentence.
    pub answer: String,
    /// The matches the answer was grounded on.
    pub matches: Vec<RetrievalMatch>,
    /// `false` when nothing was retrieved and the generator was skipped.
    pub grounded: bool,
}
