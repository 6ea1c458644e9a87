//! Generation job record shared by the executor, the repair loop and the
//! continuation manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::ArtifactKind;
use crate::content::GenerationPayload;
use crate::tier::ModelTier;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Job state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lifecycle of a job relative to the user's attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Progress is visible; the cancel affordance is live.
    Foreground,
    /// The user dismissed the progress view; the job keeps running.
    Background,
    /// Finished while in the background; result waits in the cache slot.
    CachedReady,
    /// Result handed to the UI.
    Consumed,
    Cancelled,
    /// Halted on a rate limit with no tier left; needs a user decision.
    RateLimited,
    /// Bound exceeded or unrecoverable failure.
    Failed,
}

impl JobState {
    /// Active jobs hold the per-kind slot.
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Foreground | JobState::Background)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Consumed | JobState::Cancelled | JobState::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Foreground => "foreground",
            JobState::Background => "background",
            JobState::CachedReady => "cached_ready",
            JobState::Consumed => "consumed",
            JobState::Cancelled => "cancelled",
            JobState::RateLimited => "rate_limited",
            JobState::Failed => "failed",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Job result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Output of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum JobResult {
    /// Free-text reply (chat answers, summaries).
    Text(String),
    /// Validated list of same-shaped records (quiz, flashcards, checklist).
    Records(Vec<serde_json::Value>),
}

impl JobResult {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            JobResult::Text(t) => Some(t),
            JobResult::Records(_) => None,
        }
    }

    pub fn records(&self) -> Option<&[serde_json::Value]> {
        match self {
            JobResult::Records(r) => Some(r),
            JobResult::Text(_) => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generation job
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One end-to-end generation request for a given artifact kind.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub kind: ArtifactKind,
    pub current_tier: ModelTier,
    /// Every tier the job has been attempted at, in order.
    pub tier_history: Vec<ModelTier>,
    pub attempt_count: u32,
    pub malformed_retry_count: u32,
    pub state: JobState,
    pub payload: GenerationPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    pub background: bool,
    pub rate_limited: bool,
    /// Last human-readable status line emitted for this job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Create a job starting at `starting_tier` (PRIMARY unless a sticky
    /// downgrade is in effect).
    pub fn new(kind: ArtifactKind, payload: GenerationPayload, starting_tier: ModelTier) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            current_tier: starting_tier,
            tier_history: vec![starting_tier],
            attempt_count: 0,
            malformed_retry_count: 0,
            state: JobState::Foreground,
            payload,
            result: None,
            background: false,
            rate_limited: false,
            last_status: None,
            created_at: Utc::now(),
        }
    }
}
