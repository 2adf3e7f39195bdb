//! Legal Embed
//!
//! Embedding generation and similarity ranking for legal texts.
//!
//! # Usage
//!
//! ```bash
//! legal-embed embed "Contrato de trabajo" "Despido improcedente"
//! legal-embed similar --query "vacaciones" --documents docs.json --top-k 3
//! legal-embed --provider mock stats --sample "derecho laboral"
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/legal-embed/config.toml)
//! 3. Config file passed with --config
//! 4. Environment variables (LEGAL_EMBED_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use legal_embed::{
    embed_texts, init_logging, load_settings, show_stats, similar_documents, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(
        cli.config.as_deref(),
        cli.log_level.as_deref(),
        cli.provider.as_deref(),
    )?;
    init_logging(&settings)?;

    match cli.command {
        Commands::Embed { texts, preview } => {
            embed_texts(settings, &texts, preview).await?;
        }
        Commands::Similar {
            query,
            documents,
            top_k,
            threshold,
        } => {
            similar_documents(settings, &query, &documents, top_k, threshold).await?;
        }
        Commands::Stats { sample } => {
            show_stats(settings, sample.as_deref()).await?;
        }
    }

    Ok(())
}
