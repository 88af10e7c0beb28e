//! Deterministic offline embeddings.
//!
//! [`HashEmbeddingProvider`] hashes lowercase word tokens into a fixed number
//! of buckets and L2-normalizes the counts. Texts that share words land close
//! together under cosine similarity, which is enough for demos, tests and
//! air-gapped smoke runs. It has no notion of meaning.

use async_trait::async_trait;

use crate::embedding::{EmbedDirection, EmbeddingProvider, ensure_not_blank};
use crate::error::{RagError, Result};

/// Feature-hashing bag-of-words embedder.
///
/// Both directions share one geometry, so the direction only affects
/// validation.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    /// Create a provider producing `dimensions`-long vectors.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] if `dimensions == 0`.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::InvalidArgument("dimensions must be greater than zero".into()));
        }
        Ok(Self { dimensions })
    }

    fn bucket(&self, token: &str) -> usize {
        // FNV-1a, stable across platforms and releases.
        let hash = token.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(0x100_0000_01b3)
        });
        (hash % self.dimensions as u64) as usize
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
        {
            v[self.bucket(&token)] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str, direction: EmbedDirection) -> Result<Vec<f32>> {
        ensure_not_blank(text, direction)?;
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_words_score_higher() {
        let p = HashEmbeddingProvider::new(256).unwrap();
        let q = p.embed("dogs are mammals", EmbedDirection::Query).await.unwrap();
        let near = p.embed("Dogs are mammals too.", EmbedDirection::Document).await.unwrap();
        let far = p.embed("Quarterly invoices overdue", EmbedDirection::Document).await.unwrap();
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&q, &near) > dot(&q, &far));
    }

    #[tokio::test]
    async fn rejects_blank_text() {
        let p = HashEmbeddingProvider::new(8).unwrap();
        let err = p.embed("  ", EmbedDirection::Query).await;
        assert!(matches!(err, Err(RagError::EmptyInput { .. })));
    }
}
