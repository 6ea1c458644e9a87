use serde::Serialize;

use crate::artifact::ArtifactKind;
use crate::job::JobState;
use crate::tier::ModelTier;

/// Structured trace events emitted across all leqture crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ModelAttempt {
        job_id: String,
        kind: ArtifactKind,
        tier: ModelTier,
        model: String,
        attempt: u32,
        reason: String,
    },
    ModelResponse {
        job_id: String,
        model: String,
        outcome: String,
        duration_ms: u64,
    },
    TierAdvanced {
        job_id: String,
        kind: ArtifactKind,
        from: ModelTier,
        to: ModelTier,
    },
    RateLimited {
        job_id: String,
        kind: ArtifactKind,
        tier: ModelTier,
        retry_after_secs: u64,
        exhausted: bool,
    },
    MalformedOutput {
        job_id: String,
        kind: ArtifactKind,
        retry: u32,
        reason: String,
    },
    JobTransition {
        job_id: String,
        kind: ArtifactKind,
        from: Option<JobState>,
        to: JobState,
    },
    SlideClassified {
        group_id: String,
        similarity: f64,
        changed: bool,
        created: bool,
    },
    FileUploaded {
        display_name: String,
        bytes: usize,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "lq_event");
    }
}
