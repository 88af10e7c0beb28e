//! Lazily initialized embedding providers.
//!
//! Loading a local embedding model is slow and must happen once per process.
//! [`LazyEmbeddingProvider`] defers creation of the real provider to the first
//! `embed` call. Concurrent first callers all wait on the same in-flight
//! initialization; a failed initialization is not cached, so the next call
//! tries again.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragkit::lazy::LazyEmbeddingProvider;
//! use ragkit::local::FastEmbedFactory;
//!
//! let provider = Arc::new(LazyEmbeddingProvider::new(FastEmbedFactory::default(), 384));
//! // The model is loaded here, once, no matter how many tasks call embed.
//! let v = provider.embed("hello", EmbedDirection::Query).await?;
//!
//! // Release the model; the next embed call loads it again.
//! provider.reset();
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::embedding::{EmbedDirection, EmbeddingProvider, ensure_not_blank};
use crate::error::{RagError, Result};

type ProviderCell = Arc<OnceCell<Arc<dyn EmbeddingProvider>>>;

/// Creates the real provider behind a [`LazyEmbeddingProvider`].
#[async_trait]
pub trait EmbeddingProviderFactory: Send + Sync {
    /// Build the provider. Called at most once per successful initialization.
    async fn create(&self) -> Result<Arc<dyn EmbeddingProvider>>;
}

/// An [`EmbeddingProvider`] that builds its backend on first use.
///
/// All methods take `&self`, so a provider shared through an `Arc` (for
/// example one also handed to a [`RagPipeline`](crate::RagPipeline)) can
/// still be warmed up or [`reset`](Self::reset).
pub struct LazyEmbeddingProvider<F> {
    factory: F,
    dimensions: usize,
    cell: Mutex<ProviderCell>,
}

impl<F: EmbeddingProviderFactory> LazyEmbeddingProvider<F> {
    /// Wrap a factory. `dimensions` must match what the created provider reports.
    pub fn new(factory: F, dimensions: usize) -> Self {
        Self { factory, dimensions, cell: Mutex::new(Arc::new(OnceCell::new())) }
    }

    /// Whether the backend has been created.
    pub fn is_initialized(&self) -> bool {
        self.current().initialized()
    }

    /// Create the backend now instead of on the first `embed` call.
    pub async fn warm_up(&self) -> Result<()> {
        self.provider().await.map(|_| ())
    }

    /// Drop the backend so the next call initializes again.
    ///
    /// Calls already holding the old backend finish with it; an
    /// initialization in flight completes but its result is discarded.
    pub fn reset(&self) {
        let old = std::mem::replace(
            &mut *self.cell.lock().unwrap_or_else(PoisonError::into_inner),
            Arc::new(OnceCell::new()),
        );
        if old.initialized() {
            debug!("embedding provider released");
        }
    }

    fn current(&self) -> ProviderCell {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let cell = self.current();
        let provider = cell
            .get_or_try_init(|| async {
                info!(dimensions = self.dimensions, "initializing embedding provider");
                let provider = self.factory.create().await?;
                info!("embedding provider ready");
                Ok::<_, RagError>(provider)
            })
            .await?;
        Ok(provider.clone())
    }
}

#[async_trait]
impl<F: EmbeddingProviderFactory> EmbeddingProvider for LazyEmbeddingProvider<F> {
    async fn embed(&self, text: &str, direction: EmbedDirection) -> Result<Vec<f32>> {
        ensure_not_blank(text, direction)?;
        self.provider().await?.embed(text, direction).await
    }

    async fn embed_batch(
        &self,
        texts: &[&str],
        direction: EmbedDirection,
    ) -> Result<Vec<Vec<f32>>> {
        for text in texts {
            ensure_not_blank(text, direction)?;
        }
        self.provider().await?.embed_batch(texts, direction).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
