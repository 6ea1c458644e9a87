pub mod config;
pub mod generate;
pub mod group;
pub mod upload;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lq_domain::artifact::ArtifactKind;
use lq_domain::tier::ModelTier;

/// leqture: lecture study-material generation.
#[derive(Debug, Parser)]
#[command(name = "leqture", version, about)]
pub struct Cli {
    /// Config file (overrides `LQ_CONFIG`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate one artifact and print it.
    Generate {
        /// chat, quiz, flashcards, checklist or summary.
        kind: ArtifactKind,
        /// The request sent to the model.
        prompt: String,
        /// Upload a document and attach it before the prompt.
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Attach an image inline (captured slide, diagram).
        #[arg(long = "image")]
        images: Vec<PathBuf>,
        /// System instruction.
        #[arg(long)]
        system: Option<String>,
        /// Start at this tier instead of primary.
        #[arg(long)]
        tier: Option<ModelTier>,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Upload a file and print its URI.
    Upload {
        path: PathBuf,
        /// MIME type (guessed from the extension when omitted).
        #[arg(long)]
        mime: Option<String>,
    },
    /// Group slide texts (one OCR text per line) and print the assignment.
    Group {
        path: PathBuf,
        /// Similarity threshold override.
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Resolve the config path (`--config`, then `LQ_CONFIG`, then
/// `leqture.toml`) and load it, falling back to defaults when the file
/// does not exist.
pub fn load_config(
    explicit: Option<PathBuf>,
) -> anyhow::Result<(lq_domain::config::Config, PathBuf)> {
    let path = explicit
        .or_else(|| std::env::var_os("LQ_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("leqture.toml"));
    let config = lq_domain::config::Config::load_or_default(&path)?;
    Ok((config, path))
}

/// MIME type for a file extension, for uploads and inline images.
pub fn guess_mime(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
