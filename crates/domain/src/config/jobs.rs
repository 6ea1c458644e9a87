use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::artifact::ArtifactKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Job retry policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Malformed structured output is retried at most this many times.
    #[serde(default = "d_5")]
    pub max_malformed_retries: u32,
    /// Fixed wait before re-requesting after malformed output.
    #[serde(default = "d_2000")]
    pub malformed_backoff_ms: u64,
    /// Fixed wait before retrying after an HTTP or transport failure.
    #[serde(default = "d_3000")]
    pub transport_backoff_ms: u64,
    /// Consecutive transport/HTTP failures tolerated before the job fails.
    /// `0` retries forever (only a foreground cancel stops it).
    #[serde(default = "d_40")]
    pub max_transport_retries: u32,
    /// Wait used when a rate-limit response carries no advisory duration.
    #[serde(default = "d_5u64")]
    pub default_rate_limit_wait_secs: u64,
    /// Advisory rate-limit waits are never shorter than this.
    #[serde(default = "d_5u64")]
    pub min_rate_limit_wait_secs: u64,
    /// Capacity of the recent-attempt ring buffer.
    #[serde(default = "d_200")]
    pub attempt_log_capacity: usize,
    /// Minimum record count per structured kind.
    #[serde(default)]
    pub min_items: MinItems,
    /// Typical generation time per kind, used for the status ETA.
    #[serde(default)]
    pub eta_secs: EtaSecs,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_malformed_retries: d_5(),
            malformed_backoff_ms: d_2000(),
            transport_backoff_ms: d_3000(),
            max_transport_retries: d_40(),
            default_rate_limit_wait_secs: d_5u64(),
            min_rate_limit_wait_secs: d_5u64(),
            attempt_log_capacity: d_200(),
            min_items: MinItems::default(),
            eta_secs: EtaSecs::default(),
        }
    }
}

impl JobsConfig {
    pub fn malformed_backoff(&self) -> Duration {
        Duration::from_millis(self.malformed_backoff_ms)
    }

    pub fn transport_backoff(&self) -> Duration {
        Duration::from_millis(self.transport_backoff_ms)
    }

    /// The transport-failure bound, `None` when disabled.
    pub fn transport_retry_limit(&self) -> Option<u32> {
        (self.max_transport_retries > 0).then_some(self.max_transport_retries)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinItems {
    #[serde(default = "d_1")]
    pub quiz: usize,
    #[serde(default = "d_1")]
    pub flashcards: usize,
    #[serde(default = "d_5usize")]
    pub checklist: usize,
}

impl MinItems {
    /// Minimum list length for a structured kind (free-text kinds: 0).
    pub fn for_kind(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::Quiz => self.quiz,
            ArtifactKind::Flashcards => self.flashcards,
            ArtifactKind::Checklist => self.checklist,
            ArtifactKind::Chat | ArtifactKind::Summary => 0,
        }
    }
}

impl Default for MinItems {
    fn default() -> Self {
        Self {
            quiz: d_1(),
            flashcards: d_1(),
            checklist: d_5usize(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtaSecs {
    #[serde(default = "d_15")]
    pub chat: u64,
    #[serde(default = "d_60")]
    pub quiz: u64,
    #[serde(default = "d_60")]
    pub flashcards: u64,
    #[serde(default = "d_45")]
    pub checklist: u64,
    #[serde(default = "d_90")]
    pub summary: u64,
}

impl EtaSecs {
    pub fn for_kind(&self, kind: ArtifactKind) -> u64 {
        match kind {
            ArtifactKind::Chat => self.chat,
            ArtifactKind::Quiz => self.quiz,
            ArtifactKind::Flashcards => self.flashcards,
            ArtifactKind::Checklist => self.checklist,
            ArtifactKind::Summary => self.summary,
        }
    }
}

impl Default for EtaSecs {
    fn default() -> Self {
        Self {
            chat: d_15(),
            quiz: d_60(),
            flashcards: d_60(),
            checklist: d_45(),
            summary: d_90(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_1() -> usize {
    1
}
fn d_5() -> u32 {
    5
}
fn d_5u64() -> u64 {
    5
}
fn d_5usize() -> usize {
    5
}
fn d_15() -> u64 {
    15
}
fn d_45() -> u64 {
    45
}
fn d_60() -> u64 {
    60
}
fn d_90() -> u64 {
    90
}
fn d_200() -> usize {
    200
}
fn d_2000() -> u64 {
    2_000
}
fn d_3000() -> u64 {
    3_000
}
fn d_40() -> u32 {
    40
}
