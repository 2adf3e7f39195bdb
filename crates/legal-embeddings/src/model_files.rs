//! On-disk store for local model files.
//!
//! Files are fetched from the Hugging Face Hub once and reused afterwards.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::EmbeddingError;
use crate::progress::ProgressReporter;

/// Files a BERT sentence-transformer needs.
pub const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// Location of a model's files on disk.
#[derive(Debug, Clone)]
pub struct ModelStore {
    /// Root directory holding one subdirectory per model
    pub root: PathBuf,
    /// Hub repository ID, e.g. "sentence-transformers/all-MiniLM-L6-v2"
    pub repo_id: String,
}

/// Resolved paths to a model's files.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            repo_id: repo_id.into(),
        }
    }

    /// Store under the user cache directory (`~/.cache/legal-embed/models`).
    pub fn in_user_cache(repo_id: impl Into<String>) -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join(legal_types::APP_NAME)
            .join("models");
        Self::new(root, repo_id)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.root.join(self.repo_id.replace('/', "_"))
    }

    pub fn is_complete(&self) -> bool {
        let dir = self.model_dir();
        MODEL_FILES.iter().all(|f| dir.join(f).exists())
    }

    pub fn paths(&self) -> ModelPaths {
        let dir = self.model_dir();
        ModelPaths {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        }
    }

    /// Return local paths, downloading any missing files first.
    ///
    /// Blocking; call from a blocking context.
    pub fn fetch(&self, progress: &ProgressReporter) -> Result<ModelPaths, EmbeddingError> {
        if self.is_complete() {
            debug!(path = ?self.model_dir(), "Using cached model files");
            return Ok(self.paths());
        }

        info!(repo = %self.repo_id, "Downloading model files");
        let api = hf_hub::api::sync::Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
        let repo = api.model(self.repo_id.clone());

        let dir = self.model_dir();
        std::fs::create_dir_all(&dir)?;

        for (i, filename) in MODEL_FILES.iter().enumerate() {
            let dest = dir.join(filename);
            if dest.exists() {
                continue;
            }
            progress.active(
                "download",
                format!("Downloading {filename} ({}/{})", i + 1, MODEL_FILES.len()),
            );
            let source = repo
                .get(filename)
                .map_err(|e| EmbeddingError::Download(format!("{filename}: {e}")))?;
            copy_into(&source, &dest)?;
        }
        progress.completed("download", format!("Model files ready in {}", dir.display()));

        Ok(self.paths())
    }
}

fn copy_into(source: &Path, dest: &Path) -> Result<(), EmbeddingError> {
    std::fs::copy(source, dest)?;
    debug!(file = ?dest, "Model file stored");
    Ok(())
}
