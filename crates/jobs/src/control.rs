//! Per-job control surface shared between a running job and its manager.

use lq_domain::artifact::ArtifactKind;
use lq_domain::job::GenerationJob;
use lq_domain::tier::ModelTier;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cancel::CancelToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitReason {
    MalformedOutput,
    RateLimit,
    Transport,
}

/// Progress reported by a running job.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// About to issue attempt number `attempt`.
    Attempt {
        tier: ModelTier,
        model: String,
        attempt: u32,
        reason: String,
    },
    /// Sleeping before the next attempt.
    Waiting {
        reason: WaitReason,
        duration: Duration,
    },
}

/// Receives progress from running jobs. Must not block.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, job_id: Uuid, kind: ArtifactKind, progress: Progress);
}

/// Discards all progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&self, _job_id: Uuid, _kind: ArtifactKind, _progress: Progress) {}
}

/// Handle a job loop uses to observe cancellation and its background flag,
/// and to report progress.
#[derive(Clone)]
pub struct JobControl {
    cancel: CancelToken,
    background: Arc<AtomicBool>,
    sink: Arc<dyn ProgressSink>,
}

impl JobControl {
    pub fn new(cancel: CancelToken, background: Arc<AtomicBool>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            cancel,
            background,
            sink,
        }
    }

    /// A foreground control not attached to any manager.
    pub fn detached() -> Self {
        Self::new(
            CancelToken::new(),
            Arc::new(AtomicBool::new(false)),
            Arc::new(NoProgress),
        )
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_background(&self) -> bool {
        self.background.load(Ordering::Acquire)
    }

    pub fn report(&self, job: &GenerationJob, progress: Progress) {
        self.sink.progress(job.id, job.kind, progress);
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` on cancel.
    pub async fn wait(&self, job: &GenerationJob, reason: WaitReason, duration: Duration) -> bool {
        self.report(job, Progress::Waiting { reason, duration });
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
