//! Command implementations for legal-embed.
//!
//! Handles:
//! - embed: embed texts and print a preview of each vector
//! - similar: rank a JSON document set against a query
//! - stats: print the active provider's counters

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::{info, warn};

use legal_embeddings::{EmbeddingManager, EmbeddingVector};
use legal_types::{ProviderType, Settings};
use legal_vector::{find_similar, SimilarityResult};

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    provider_override: Option<&str>,
) -> Result<Settings> {
    let settings = Settings::load(config_path).context("Failed to load configuration")?;
    apply_overrides(settings, log_level_override, provider_override)
}

/// Apply CLI flag overrides to loaded settings.
pub fn apply_overrides(
    mut settings: Settings,
    log_level_override: Option<&str>,
    provider_override: Option<&str>,
) -> Result<Settings> {
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    if let Some(provider) = provider_override {
        settings.default_provider =
            ProviderType::from_str(provider).context("Invalid --provider value")?;
    }
    Ok(settings)
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Build a manager and activate the configured provider.
async fn start_manager(settings: Settings) -> Result<EmbeddingManager> {
    let requested = settings.default_provider;
    let manager = EmbeddingManager::new(settings);
    let active = manager
        .switch_provider(requested)
        .await
        .context("Failed to initialize an embedding provider")?;
    if active != requested {
        warn!(requested = %requested, active = %active, "Using fallback provider");
    }
    Ok(manager)
}

/// Embed each text and print its dimensions and leading components.
pub async fn embed_texts(settings: Settings, texts: &[String], preview: usize) -> Result<()> {
    let manager = start_manager(settings).await?;
    let vectors = manager
        .embed_batch(texts)
        .await
        .context("Failed to embed texts")?;

    for (text, vector) in texts.iter().zip(&vectors) {
        println!("{text}");
        println!("  {}", format_preview(vector, preview));
    }

    manager.destroy().await;
    Ok(())
}

/// Rank the documents in `documents_path` against `query` and print them.
pub async fn similar_documents(
    settings: Settings,
    query: &str,
    documents_path: &Path,
    top_k: usize,
    threshold: f32,
) -> Result<()> {
    let documents = read_documents(documents_path)?;
    info!(count = documents.len(), "Documents loaded");

    let manager = start_manager(settings).await?;
    let results = rank_documents(&manager, query, &documents, top_k, threshold).await?;

    if results.is_empty() {
        println!("No documents scored above {threshold}");
    }
    for (rank, result) in results.iter().enumerate() {
        println!("{:>3}. {:.4}  {}", rank + 1, result.score, result.id);
    }

    manager.destroy().await;
    Ok(())
}

/// Optionally embed `sample`, then print the active provider's stats as JSON.
pub async fn show_stats(settings: Settings, sample: Option<&str>) -> Result<()> {
    let manager = start_manager(settings).await?;
    if let Some(text) = sample {
        manager
            .embed(text)
            .await
            .context("Failed to embed sample text")?;
    }

    let stats = manager.all_stats().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("Failed to serialize stats")?
    );

    manager.destroy().await;
    Ok(())
}

/// Read a JSON object mapping document IDs to texts.
pub fn read_documents(path: &Path) -> Result<BTreeMap<String, String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON object of id -> text", path.display()))
}

/// Embed `documents` and `query`, then rank by cosine similarity.
pub async fn rank_documents(
    manager: &EmbeddingManager,
    query: &str,
    documents: &BTreeMap<String, String>,
    top_k: usize,
    threshold: f32,
) -> Result<Vec<SimilarityResult>> {
    let (ids, texts): (Vec<&String>, Vec<String>) = documents
        .iter()
        .map(|(id, text)| (id, text.clone()))
        .unzip();

    let vectors = manager
        .embed_batch(&texts)
        .await
        .context("Failed to embed documents")?;
    let query_vector = manager
        .embed(query)
        .await
        .context("Failed to embed query")?;

    let results = find_similar(&query_vector, ids.into_iter().zip(&vectors), top_k, threshold)
        .context("Failed to rank documents")?;
    Ok(results)
}

/// `"<dims> dims: [v0, v1, ...]"` with at most `count` components.
pub fn format_preview(vector: &EmbeddingVector, count: usize) -> String {
    let shown: Vec<String> = vector
        .values()
        .iter()
        .take(count)
        .map(|v| format!("{v:.4}"))
        .collect();
    let ellipsis = if vector.dimensions() > count { ", ..." } else { "" };
    format!(
        "{} dims: [{}{}]",
        vector.dimensions(),
        shown.join(", "),
        ellipsis
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn mock_settings() -> Settings {
        Settings {
            default_provider: ProviderType::Mock,
            mock_latency_ms: 0,
            ..Settings::default()
        }
    }

    #[test]
    fn test_apply_overrides() {
        let settings = apply_overrides(Settings::default(), Some("debug"), Some("mock")).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.default_provider, ProviderType::Mock);

        assert!(apply_overrides(Settings::default(), None, Some("word2vec")).is_err());
    }

    #[test]
    fn test_format_preview() {
        let vector = EmbeddingVector::new(vec![3.0, 4.0, 0.0]);
        assert_eq!(format_preview(&vector, 2), "3 dims: [0.6000, 0.8000, ...]");
        assert_eq!(format_preview(&vector, 3), "3 dims: [0.6000, 0.8000, 0.0000]");
    }

    #[test]
    fn test_read_documents() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"doc-1": "Contrato", "doc-2": "Despido"}}"#).unwrap();

        let documents = read_documents(file.path()).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents["doc-2"], "Despido");
    }

    #[test]
    fn test_read_documents_rejects_arrays() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"["Contrato", "Despido"]"#).unwrap();
        assert!(read_documents(file.path()).is_err());
    }

    #[tokio::test]
    async fn test_rank_documents_finds_exact_match() {
        let manager = start_manager(mock_settings()).await.unwrap();
        let documents: BTreeMap<String, String> = [
            ("a", "Recurso de apelación"),
            ("b", "Pensión de alimentos"),
            ("c", "Contrato de obra"),
        ]
        .into_iter()
        .map(|(id, text)| (id.to_string(), text.to_string()))
        .collect();

        let results = rank_documents(&manager, "Pensión de alimentos", &documents, 1, -1.0)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }
}
