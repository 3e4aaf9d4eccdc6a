//! Embedding model abstraction.
//!
//! The embedding is treated as a pure function `texts → vectors`.
//! [`DenseEmbedder`] wraps fastembed; callers run it via
//! `spawn_blocking` since ONNX inference is CPU-bound. [`HashEmbedder`]
//! is a deterministic bag-of-words stand-in for tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::warn;

use openfeeder_common::{FeederError, Result};

pub trait Embedder: Send + Sync {
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// fastembed-backed dense embedder.
pub struct DenseEmbedder {
    model: Mutex<TextEmbedding>,
}

impl DenseEmbedder {
    pub fn new(model_name: &str) -> Result<Self> {
        let model = match model_name {
            "all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            other => {
                warn!(model = %other, "unknown embedding model, falling back to all-MiniLM-L6-v2");
                EmbeddingModel::AllMiniLML6V2
            }
        };

        let inner = TextEmbedding::try_new(InitOptions {
            model_name: model,
            show_download_progress: false,
            ..Default::default()
        })
        .map_err(|e| FeederError::Embedding(e.to_string()))?;

        Ok(Self {
            model: Mutex::new(inner),
        })
    }
}

impl Embedder for DenseEmbedder {
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = self
            .model
            .lock()
            .map_err(|_| FeederError::Embedding("embedding model mutex poisoned".into()))?;
        model
            .embed(texts, None)
            .map_err(|e| FeederError::Embedding(e.to_string()))
    }
}

/// Deterministic bag-of-words embedder for tests: tokens hash into a
/// fixed number of buckets, vectors are L2-normalised. Shared vocabulary
/// yields small cosine distance; disjoint vocabulary yields large.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(32)
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dimension];
                for token in text.to_lowercase().split_whitespace() {
                    let mut hasher = DefaultHasher::new();
                    token.hash(&mut hasher);
                    let bucket = (hasher.finish() as usize) % self.dimension;
                    vector[bucket] += 1.0;
                }
                let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for x in &mut vector {
                        *x /= norm;
                    }
                }
                vector
            })
            .collect())
    }
}
