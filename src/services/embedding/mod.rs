//! Text embedding: the `Embedder` seam and its implementations.
//!
//! An embedder is constructed once, owned explicitly and shared through an
//! `Arc` by whichever orchestrators need it. Loading a model is the expensive
//! part; `embed` calls reuse the loaded state.

mod hash;
mod onnx;

pub use hash::HashEmbedder;
pub use onnx::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::EmbeddingError;
use crate::models::{Config, EmbeddingProvider};

pub type SharedEmbedder = Arc<dyn Embedder>;

/// Maps strings to fixed-dimension vectors, one per input, in input order.
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model, recorded in persisted indexes.
    fn model_id(&self) -> &str;

    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed a batch. An empty batch yields an empty result.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single string as a batch of one.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InferenceError("empty embedding response".to_string()))
    }
}

/// Embed `texts` in sub-batches of at most `batch_size` to bound memory.
pub fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let batch_size = batch_size.max(1);
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for (batch_no, batch) in texts.chunks(batch_size).enumerate() {
        debug!(batch = batch_no, size = batch.len(), "embedding batch");
        let embeddings = embedder.embed(batch)?;
        all_embeddings.extend(embeddings);
    }

    Ok(all_embeddings)
}

/// Construct the embedder selected by configuration.
pub fn create_embedder(config: &Config) -> Result<SharedEmbedder, EmbeddingError> {
    let embedding = &config.embedding;
    match embedding.provider {
        EmbeddingProvider::Hash => {
            info!(dimension = embedding.dimension, "using hash embedder");
            Ok(Arc::new(HashEmbedder::new(embedding.dimension as usize)))
        }
        EmbeddingProvider::Onnx => {
            let model_dir = config.model_dir().ok_or_else(|| {
                EmbeddingError::ModelNotFound("could not determine models directory".to_string())
            })?;
            info!(model = %embedding.model_id, dir = %model_dir.display(), "loading embedding model");
            let model = OnnxEmbedder::load(embedding, Path::new(&model_dir))?;
            info!(dimension = model.dimension(), "embedding model loaded");
            Ok(Arc::new(model))
        }
    }
}

pub(crate) fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
