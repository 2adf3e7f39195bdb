//! legal-embed library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (embed, similar, stats)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    apply_overrides, embed_texts, format_preview, init_logging, load_settings, rank_documents,
    read_documents, show_stats, similar_documents,
};
