//! In-process embeddings with [fastembed](https://docs.rs/fastembed).
//!
//! [`FastEmbedFactory`] is meant to sit behind a
//! [`LazyEmbeddingProvider`](crate::lazy::LazyEmbeddingProvider): the ONNX
//! model is downloaded and loaded on the first `embed` call, once per process.
//! Inference runs on the blocking thread pool.
//!
//! This module is only available when the `local-embeddings` feature is enabled.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::debug;

use crate::embedding::{
    DirectionPrefixes, EmbedDirection, EmbeddingProvider, check_dimensions, ensure_not_blank,
};
use crate::error::{RagError, Result};
use crate::lazy::EmbeddingProviderFactory;

const PROVIDER: &str = "fastembed";

/// Map a model name to a fastembed model and its output dimension.
pub fn model_by_name(name: &str) -> Result<(EmbeddingModel, usize)> {
    match name {
        "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
        "bge-large-en-v1.5" => Ok((EmbeddingModel::BGELargeENV15, 1024)),
        "nomic-embed-text-v1.5" => Ok((EmbeddingModel::NomicEmbedTextV15, 768)),
        "multilingual-e5-small" => Ok((EmbeddingModel::MultilingualE5Small, 384)),
        "multilingual-e5-base" => Ok((EmbeddingModel::MultilingualE5Base, 768)),
        other => Err(RagError::InvalidArgument(format!("unknown local embedding model: {other}"))),
    }
}

/// Loads a fastembed model when asked to.
#[derive(Debug, Clone)]
pub struct FastEmbedFactory {
    model_name: String,
    dimensions: usize,
    prefixes: DirectionPrefixes,
    show_download_progress: bool,
}

impl Default for FastEmbedFactory {
    fn default() -> Self {
        Self {
            model_name: "bge-small-en-v1.5".to_string(),
            dimensions: 384,
            prefixes: DirectionPrefixes::none(),
            show_download_progress: false,
        }
    }
}

impl FastEmbedFactory {
    /// Use a named model (see [`model_by_name`]). Nomic and E5 models get
    /// their direction prefixes automatically.
    pub fn new(model_name: &str) -> Result<Self> {
        let (_, dimensions) = model_by_name(model_name)?;
        let prefixes = if model_name.starts_with("nomic") {
            DirectionPrefixes::nomic()
        } else if model_name.contains("e5") {
            DirectionPrefixes::e5()
        } else {
            DirectionPrefixes::none()
        };
        Ok(Self { model_name: model_name.to_string(), dimensions, prefixes, ..Self::default() })
    }

    /// Output dimension of the configured model.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Print model download progress to stderr.
    pub fn with_download_progress(mut self, show: bool) -> Self {
        self.show_download_progress = show;
        self
    }
}

#[async_trait]
impl EmbeddingProviderFactory for FastEmbedFactory {
    async fn create(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let (model, dimensions) = model_by_name(&self.model_name)?;
        let show = self.show_download_progress;
        let name = self.model_name.clone();

        let loaded = tokio::task::spawn_blocking(move || {
            TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(show))
        })
        .await
        .map_err(|e| RagError::provider(PROVIDER, format!("model loading task failed: {e}")))?
        .map_err(|e| RagError::provider(PROVIDER, format!("failed to load '{name}': {e}")))?;

        debug!(model = %self.model_name, dimensions, "local embedding model loaded");
        Ok(Arc::new(FastEmbedProvider {
            model: Arc::new(Mutex::new(loaded)),
            dimensions,
            prefixes: self.prefixes.clone(),
        }))
    }
}

/// A loaded fastembed model.
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    dimensions: usize,
    prefixes: DirectionPrefixes,
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str, direction: EmbedDirection) -> Result<Vec<f32>> {
        self.embed_batch(&[text], direction)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::provider(PROVIDER, "model returned no embeddings"))
    }

    async fn embed_batch(
        &self,
        texts: &[&str],
        direction: EmbedDirection,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            ensure_not_blank(text, direction)?;
        }
        let inputs: Vec<String> = texts.iter().map(|t| self.prefixes.apply(t, direction)).collect();
        let model = Arc::clone(&self.model);

        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| RagError::provider(PROVIDER, "model lock poisoned"))?;
            model
                .embed(inputs, None)
                .map_err(|e| RagError::provider(PROVIDER, format!("inference failed: {e}")))
        })
        .await
        .map_err(|e| RagError::provider(PROVIDER, format!("inference task failed: {e}")))??;

        for v in &vectors {
            check_dimensions(PROVIDER, self.dimensions, v)?;
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models_resolve_with_dimensions() {
        assert_eq!(model_by_name("bge-small-en-v1.5").unwrap().1, 384);
        assert_eq!(model_by_name("nomic-embed-text-v1.5").unwrap().1, 768);
        assert!(model_by_name("gpt-2").is_err());
    }

    #[test]
    fn prefixes_follow_the_model_family() {
        let nomic = FastEmbedFactory::new("nomic-embed-text-v1.5").unwrap();
        assert_eq!(nomic.prefixes, DirectionPrefixes::nomic());
        let e5 = FastEmbedFactory::new("multilingual-e5-small").unwrap();
        assert_eq!(e5.prefixes, DirectionPrefixes::e5());
        assert_eq!(FastEmbedFactory::default().dimensions(), 384);
    }
}
