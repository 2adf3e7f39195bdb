//! CLI argument parsing for legal-embed.
//!
//! CLI flags override every other configuration source.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Legal Embed
///
/// Generate embeddings for legal texts and rank documents by similarity.
#[derive(Parser, Debug)]
#[command(name = "legal-embed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/legal-embed/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Embedding provider (local_model, remote_api, mock)
    #[arg(short, long, global = true)]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed one or more texts and print a preview of each vector
    Embed {
        /// Texts to embed
        #[arg(required = true)]
        texts: Vec<String>,

        /// Number of leading components to print
        #[arg(long, default_value = "8")]
        preview: usize,
    },

    /// Rank documents by similarity to a query
    Similar {
        /// Query text
        #[arg(short, long)]
        query: String,

        /// JSON file mapping document IDs to texts
        #[arg(short, long)]
        documents: PathBuf,

        /// Maximum results
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,

        /// Minimum similarity score
        #[arg(short, long, default_value = "0.0", allow_hyphen_values = true)]
        threshold: f32,
    },

    /// Print provider statistics as JSON
    Stats {
        /// Text to embed before reading stats
        #[arg(short, long)]
        sample: Option<String>,
    },
}
