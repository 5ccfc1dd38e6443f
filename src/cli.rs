use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::language::Language;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a single presentation
    Translate {
        /// Input .ppt or .pptx file
        #[arg(short, long)]
        input: PathBuf,

        /// Source language (zh-TW, en, ja or a common name)
        #[arg(long, value_parser = parse_language)]
        from: Language,

        /// Target language (zh-TW, en, ja or a common name)
        #[arg(long, value_parser = parse_language)]
        to: Language,

        /// Output directory for translated files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Translate every presentation in a directory
    Batch {
        /// Input directory containing presentations
        #[arg(short, long)]
        input_dir: PathBuf,

        #[arg(long, value_parser = parse_language)]
        from: Language,

        #[arg(long, value_parser = parse_language)]
        to: Language,

        /// Output directory for translated files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Start an interactive chat session
    Chat,

    /// List supported languages and the names they are recognized by
    Languages,

    /// Manage translation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Check that the configured completion services are reachable
    Check,

    /// Write a configuration file with default values
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List cached translations
    List,

    /// Clear all cached translations
    Clear,
}

/// Accepts canonical codes as well as the phrasings users type.
pub fn parse_language(value: &str) -> Result<Language, String> {
    Language::normalize(value).ok_or_else(|| {
        let supported = Language::ALL.iter().map(|l| l.code()).collect::<Vec<_>>().join(", ");
        format!("unsupported language '{}' (supported: {})", value, supported)
    })
}
