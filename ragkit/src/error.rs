//! Error types for the `ragkit` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
///
/// Validation failures ([`EmptyInput`](RagError::EmptyInput),
/// [`InvalidArgument`](RagError::InvalidArgument)) are raised before any
/// external call is made. Failures from external capabilities are never
/// retried here; the orchestrator wraps them in [`Pipeline`](RagError::Pipeline)
/// so the original cause stays reachable.
#[derive(Debug, Error)]
pub enum RagError {
    /// Blank document text, blank question, or content that normalized to nothing.
    #[error("empty input: {what}")]
    EmptyInput {
        /// What was empty (e.g. `"question"`, `"document content"`).
        what: String,
    },

    /// A bad argument or configuration value (`top_k == 0`, overlap >= size, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The vector store could not be reached or rejected the operation.
    #[error("vector store unavailable ({backend}): {message}")]
    StoreUnavailable {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding or generation capability failed.
    #[error("provider error ({provider}): {message}")]
    Provider {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An existing store was created with a different dimension or metric.
    #[error("schema mismatch ({backend}): {message}")]
    SchemaMismatch {
        /// The vector store backend that detected the mismatch.
        backend: String,
        /// What differs between the stored and the requested schema.
        message: String,
    },

    /// A failure in one of the pipeline operations, wrapping its cause.
    #[error("{operation} failed: {source}")]
    Pipeline {
        /// The pipeline operation that failed (e.g. `"ingest 'doc1'"`).
        operation: String,
        /// The underlying error.
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    pub(crate) fn empty(what: impl Into<String>) -> Self {
        Self::EmptyInput { what: what.into() }
    }

    pub(crate) fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider { provider: provider.into(), message: message.into() }
    }

    pub(crate) fn store(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreUnavailable { backend: backend.into(), message: message.into() }
    }

    pub(crate) fn wrap(operation: impl Into<String>, source: RagError) -> Self {
        Self::Pipeline { operation: operation.into(), source: Box::new(source) }
    }

    /// Return the innermost error, unwrapping any [`Pipeline`](RagError::Pipeline) layers.
    pub fn root_cause(&self) -> &RagError {
        match self {
            Self::Pipeline { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// `true` if the root cause is a validation error rather than an external failure.
    pub fn is_validation(&self) -> bool {
        matches!(self.root_cause(), Self::EmptyInput { .. } | Self::InvalidArgument(_))
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
