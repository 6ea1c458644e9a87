//! `leqture upload`: push a file through the resumable upload protocol.

use std::path::Path;

use anyhow::Context;
use lq_domain::config::Config;
use lq_providers::{GeminiTransport, ModelTransport, UploadRequest};

use super::guess_mime;

pub async fn run(config: &Config, path: &Path, mime: Option<String>) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let display_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".into());
    let mime_type = mime.unwrap_or_else(|| guess_mime(path).into());

    let transport = GeminiTransport::from_config(&config.llm)?;
    let file = transport
        .upload(UploadRequest {
            display_name,
            mime_type,
            bytes,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&file)?);
    Ok(())
}
