//! sieve-embed
//!
//! Deterministic, model-free embeddings. Each lowercased alphanumeric token is
//! hashed (xxHash64) into one of `dim` buckets; the bucket vector is L2
//! normalized, so texts sharing vocabulary land close in cosine space.

use std::hash::Hasher;
use std::sync::Arc;

use anyhow::{bail, Result};
use sieve_core::config::EmbeddingConfig;
use sieve_core::traits::EmbeddingProvider;
use sieve_core::vector::l2_normalize;
use twox_hash::XxHash64;

pub struct HashEmbedder {
    id: String,
    dim: usize,
    max_chars: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize, max_chars: usize) -> Self {
        let dim = dim.max(1);
        Self { id: format!("hash:xxh64:d{dim}"), dim, max_chars }
    }

    pub fn from_config(cfg: &EmbeddingConfig) -> Self { Self::new(cfg.dimension, cfg.max_chars) }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(token.as_bytes());
        let h = hasher.finish();
        let idx = (h % self.dim as u64) as usize;
        // High bits pick the weight so colliding tokens rarely cancel out.
        let weight = 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
        (idx, weight)
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let chars = text.chars().count();
        if chars > self.max_chars { bail!("input of {chars} characters exceeds the {} character limit", self.max_chars); }
        let mut v = vec![0f32; self.dim];
        let mut tokens = 0usize;
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let (idx, weight) = self.bucket(&token.to_lowercase());
            v[idx] += weight;
            tokens += 1;
        }
        if tokens == 0 { bail!("cannot embed empty text"); }
        l2_normalize(&mut v);
        Ok(v)
    }
}

/// Shared provider built from configuration.
pub fn default_embedder(cfg: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> { Arc::new(HashEmbedder::from_config(cfg)) }
