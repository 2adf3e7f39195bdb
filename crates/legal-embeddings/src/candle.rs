//! Candle BERT sentence embedder.
//!
//! Mean-pools the last hidden state over real tokens and L2-normalizes it.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Encoding, Tokenizer};
use tracing::{debug, info};

use crate::error::EmbeddingError;
use crate::model_files::{ModelPaths, ModelStore};
use crate::progress::ProgressReporter;
use crate::vector::EmbeddingVector;

/// Maximum tokens per input; longer texts are truncated.
pub const MAX_SEQ_LENGTH: usize = 256;

/// Loaded BERT model plus tokenizer. Inference is blocking.
pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimensions: usize,
}

impl CandleEmbedder {
    /// Fetch (if needed) and load the model in `store`.
    pub fn load(store: &ModelStore, progress: &ProgressReporter) -> Result<Self, EmbeddingError> {
        let paths = store.fetch(progress)?;
        Self::load_from_paths(&paths, progress)
    }

    pub fn load_from_paths(
        paths: &ModelPaths,
        progress: &ProgressReporter,
    ) -> Result<Self, EmbeddingError> {
        let device = Device::Cpu;

        progress.active("load", "Reading model configuration");
        let (config, dimensions) = read_config(&paths.config)?;

        progress.active("load", "Loading tokenizer");
        let tokenizer = Tokenizer::from_file(&paths.tokenizer)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        progress.active("load", "Loading model weights");
        // Safety: the weights file is owned by the model store and not
        // modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[paths.weights.clone()], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        info!(dimensions, max_seq = MAX_SEQ_LENGTH, "Local embedding model loaded");
        progress.completed("load", format!("Model loaded ({dimensions} dimensions)"));

        Ok(Self {
            model,
            tokenizer,
            device,
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed a batch of texts, one normalized vector per input.
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let (input_ids, attention_mask) = self.pad(&encodings)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = mean_pool(&hidden, &attention_mask)?;

        let rows: Vec<Vec<f32>> = pooled.to_vec2()?;
        debug!(count = rows.len(), dimensions = self.dimensions, "Local batch embedded");
        Ok(rows.into_iter().map(EmbeddingVector::new).collect())
    }

    /// Truncate to `MAX_SEQ_LENGTH` and right-pad to the longest input.
    fn pad(&self, encodings: &[Encoding]) -> Result<(Tensor, Tensor), EmbeddingError> {
        let width = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(MAX_SEQ_LENGTH);

        let mut ids = Vec::with_capacity(encodings.len() * width);
        let mut mask = Vec::with_capacity(encodings.len() * width);
        for encoding in encodings {
            let len = encoding.get_ids().len().min(width);
            ids.extend_from_slice(&encoding.get_ids()[..len]);
            mask.extend_from_slice(&encoding.get_attention_mask()[..len]);
            ids.extend(std::iter::repeat(0u32).take(width - len));
            mask.extend(std::iter::repeat(0u32).take(width - len));
        }

        let shape = (encodings.len(), width);
        Ok((
            Tensor::from_vec(ids, shape, &self.device)?,
            Tensor::from_vec(mask, shape, &self.device)?,
        ))
    }
}

/// Parse the BERT config and its hidden size (the output dimensionality).
fn read_config(path: &Path) -> Result<(BertConfig, usize), EmbeddingError> {
    let invalid =
        |e: serde_json::Error| EmbeddingError::ModelNotFound(format!("invalid config {}: {e}", path.display()));

    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(invalid)?;
    let hidden_size = value
        .get("hidden_size")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            EmbeddingError::ModelNotFound(format!("{} has no hidden_size", path.display()))
        })?;
    let config: BertConfig = serde_json::from_value(value).map_err(invalid)?;
    Ok((config, hidden_size as usize))
}

/// Average token embeddings, ignoring padding positions.
fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor, EmbeddingError> {
    let mask = attention_mask
        .to_dtype(DType::F32)?
        .unsqueeze(2)?
        .broadcast_as(hidden.shape())?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    Ok(summed.broadcast_div(&counts)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Run with: cargo test -p legal-embeddings -- --ignored

    fn load() -> CandleEmbedder {
        let store = ModelStore::in_user_cache("sentence-transformers/all-MiniLM-L6-v2");
        CandleEmbedder::load(&store, &ProgressReporter::new()).unwrap()
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_load_model() {
        assert_eq!(load().dimensions(), 384);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embed_batch_shapes() {
        let embedder = load();
        let texts = vec![
            "Contrato de trabajo".to_string(),
            "Despido improcedente".to_string(),
            "Derecho laboral".to_string(),
        ];
        let vectors = embedder.embed_batch(&texts).unwrap();
        assert_eq!(vectors.len(), 3);
        for v in &vectors {
            assert_eq!(v.dimensions(), 384);
            assert!((v.magnitude() - 1.0).abs() < 1e-3);
        }
    }
}
