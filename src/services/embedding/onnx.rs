use std::path::Path;
use std::sync::Mutex;

use ndarray::{Array1, ArrayView2, ArrayView3};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer};

use super::{Embedder, normalize};
use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;

/// Sentence-transformer embedder backed by ONNX Runtime.
///
/// Expects `model.onnx` and `tokenizer.json` in the model directory. Token
/// embeddings are mean-pooled over the attention mask and L2-normalized.
/// Inputs longer than `max_tokens` are rejected rather than truncated.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model_id: String,
    dimension: usize,
    max_tokens: usize,
}

impl OnnxEmbedder {
    pub fn load(config: &EmbeddingConfig, model_dir: &Path) -> Result<Self, EmbeddingError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(EmbeddingError::ModelNotFound(format!(
                "model not found: {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(EmbeddingError::ModelNotFound(format!(
                "tokenizer not found: {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| EmbeddingError::LoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| EmbeddingError::LoadError(e.to_string()))?
            .with_intra_threads(num_cpus())
            .map_err(|e: ort::Error| EmbeddingError::LoadError(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| EmbeddingError::LoadError(e.to_string()))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbeddingError::TokenizerError(e.to_string()))?;

        // Length limits are enforced by rejecting input, so no truncation here.
        tokenizer
            .with_truncation(None)
            .map_err(|e| EmbeddingError::TokenizerError(e.to_string()))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model_id: config.model_id.clone(),
            dimension: config.dimension as usize,
            max_tokens: config.max_tokens as usize,
        })
    }
}

impl Embedder for OnnxEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::TokenizerError(e.to_string()))?;

        for (index, encoding) in encodings.iter().enumerate() {
            let tokens = encoding
                .get_attention_mask()
                .iter()
                .filter(|&&m| m == 1)
                .count();
            if tokens > self.max_tokens {
                return Err(EmbeddingError::InputTooLong {
                    index,
                    tokens,
                    max: self.max_tokens,
                });
            }
        }

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let batch_size = encodings.len();

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();
            for (j, ((&id, &m), &t)) in ids.iter().zip(mask.iter()).zip(types.iter()).enumerate() {
                input_ids[i * max_len + j] = id as i64;
                attention_mask[i * max_len + j] = m as i64;
                token_type_ids[i * max_len + j] = t as i64;
            }
        }

        let input_ids_tensor = Tensor::from_array(([batch_size, max_len], input_ids))
            .map_err(|e: ort::Error| EmbeddingError::InferenceError(e.to_string()))?;
        let attention_mask_tensor =
            Tensor::from_array(([batch_size, max_len], attention_mask.clone()))
                .map_err(|e: ort::Error| EmbeddingError::InferenceError(e.to_string()))?;
        let token_type_ids_tensor = Tensor::from_array(([batch_size, max_len], token_type_ids))
            .map_err(|e: ort::Error| EmbeddingError::InferenceError(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EmbeddingError::InferenceError("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![
                input_ids_tensor,
                attention_mask_tensor,
                token_type_ids_tensor
            ])
            .map_err(|e: ort::Error| EmbeddingError::InferenceError(e.to_string()))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e: ort::Error| EmbeddingError::InferenceError(e.to_string()))?;
        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();

        let hidden_dim = *shape.last().unwrap_or(&0);
        if hidden_dim != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: hidden_dim,
            });
        }

        let embeddings: Vec<Vec<f32>> = match shape.as_slice() {
            // [batch, seq, hidden]: mean-pool tokens under the attention mask
            &[batch, seq, hidden] => {
                let hidden_states = ArrayView3::from_shape((batch, seq, hidden), data)
                    .map_err(|e| EmbeddingError::InferenceError(e.to_string()))?;
                let mask = ArrayView2::from_shape((batch_size, max_len), attention_mask.as_slice())
                    .map_err(|e| EmbeddingError::InferenceError(e.to_string()))?;

                hidden_states
                    .outer_iter()
                    .zip(mask.outer_iter())
                    .map(|(tokens, token_mask)| {
                        let mut pooled = Array1::<f32>::zeros(hidden);
                        let mut count = 0f32;
                        for (token, &m) in tokens.outer_iter().zip(token_mask.iter()) {
                            if m == 0 {
                                continue;
                            }
                            pooled += &token;
                            count += 1.0;
                        }
                        if count > 0.0 {
                            pooled /= count;
                        }
                        let mut pooled = pooled.to_vec();
                        normalize(&mut pooled);
                        pooled
                    })
                    .collect()
            }
            // [batch, hidden]: the model pools internally
            &[batch, hidden] => {
                let pooled = ArrayView2::from_shape((batch, hidden), data)
                    .map_err(|e| EmbeddingError::InferenceError(e.to_string()))?;
                pooled
                    .outer_iter()
                    .map(|row| {
                        let mut embedding = row.to_vec();
                        normalize(&mut embedding);
                        embedding
                    })
                    .collect()
            }
            _ => {
                return Err(EmbeddingError::InferenceError(format!(
                    "unexpected output shape: {:?}",
                    shape
                )));
            }
        };

        if embeddings.len() != batch_size {
            return Err(EmbeddingError::InferenceError(format!(
                "model returned {} embeddings for {} inputs",
                embeddings.len(),
                batch_size
            )));
        }

        Ok(embeddings)
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
