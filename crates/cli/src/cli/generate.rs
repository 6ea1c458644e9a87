//! `leqture generate`: run one job in the foreground and print the result.
//!
//! Status updates go to stderr; Ctrl-C cancels the job.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use base64::Engine as _;
use lq_domain::artifact::ArtifactKind;
use lq_domain::config::Config;
use lq_domain::content::Part;
use lq_domain::job::JobResult;
use lq_domain::tier::ModelTier;
use lq_jobs::{JobCoordinator, JobInput, JobOutcome, StatusState};
use lq_providers::GeminiTransport;

use super::guess_mime;

pub struct GenerateArgs {
    pub kind: ArtifactKind,
    pub prompt: String,
    pub files: Vec<PathBuf>,
    pub images: Vec<PathBuf>,
    pub system: Option<String>,
    pub tier: Option<ModelTier>,
    pub json: bool,
}

pub async fn run(config: Config, args: GenerateArgs) -> anyhow::Result<()> {
    let transport = Arc::new(GeminiTransport::from_config(&config.llm)?);
    let coord = JobCoordinator::new(&config, transport);
    coord.set_sticky_tier(args.tier);

    let mut input = JobInput::new(args.prompt);
    input.system_instruction = args.system;
    for path in &args.files {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let name = display_name(path);
        eprintln!("uploading {name} ...");
        let part = coord
            .upload_attachment(name, guess_mime(path), bytes)
            .await?;
        input = input.with_attachment(part);
    }
    for path in &args.images {
        input = input.with_attachment(inline_part(path)?);
    }

    let mut handle = coord.submit(args.kind, input)?;
    let mut status = coord.subscribe();

    let outcome = loop {
        tokio::select! {
            outcome = handle.wait() => break outcome,
            update = status.recv() => {
                if let Ok(snap) = update {
                    if snap.kind == args.kind && snap.state == StatusState::Generating {
                        let eta = snap.eta_seconds.map(|s| format!(" (~{s}s)")).unwrap_or_default();
                        let line = snap.message.unwrap_or_else(|| "generating".into());
                        eprintln!("[{}] {line}{eta}", args.kind);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("cancelling ...");
                coord.cancel_kind(args.kind);
            }
        }
    };

    match outcome {
        Some(JobOutcome::Completed(result)) => print_result(&result, args.json),
        Some(JobOutcome::Failed(message)) => anyhow::bail!("{} failed: {message}", args.kind),
        Some(JobOutcome::Cancelled) => anyhow::bail!("{} cancelled", args.kind),
        None => anyhow::bail!("{} finished without a result", args.kind),
    }
}

fn print_result(result: &JobResult, json: bool) -> anyhow::Result<()> {
    match result {
        JobResult::Text(text) if !json => println!("{text}"),
        JobResult::Records(records) => println!("{}", serde_json::to_string_pretty(records)?),
        JobResult::Text(_) => println!("{}", serde_json::to_string_pretty(result)?),
    }
    Ok(())
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".into())
}

fn inline_part(path: &std::path::Path) -> anyhow::Result<Part> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(Part::InlineData {
        mime_type: guess_mime(path).into(),
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}
