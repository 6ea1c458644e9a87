use chrono::{DateTime, Utc};
use lq_domain::artifact::ArtifactKind;
use lq_domain::tier::ModelTier;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

/// A single model-attempt record.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub timestamp: DateTime<Utc>,
    pub job_id: Uuid,
    pub kind: ArtifactKind,
    pub tier: ModelTier,
    pub model: String,
    pub attempt: u32,
    pub reason: String,
}

impl AttemptRecord {
    /// Human-readable status line, e.g.
    /// `quiz: attempt 2 on gemini-2.5-flash (secondary), rate limited`.
    pub fn status_line(&self) -> String {
        format!(
            "{}: attempt {} on {} ({}), {}",
            self.kind, self.attempt, self.model, self.tier, self.reason
        )
    }
}

/// Thread-safe ring buffer of recent model attempts.
///
/// Writers never wait on readers for longer than a clone; the oldest entry
/// is evicted at capacity.
pub struct AttemptLog {
    inner: Mutex<VecDeque<AttemptRecord>>,
    capacity: usize,
}

impl AttemptLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, record: AttemptRecord) {
        if self.capacity == 0 {
            return;
        }
        let mut buf = self.inner.lock();
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(record);
    }

    /// Return the `limit` most recent attempts, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AttemptRecord> {
        let buf = self.inner.lock();
        buf.iter().rev().take(limit).cloned().collect()
    }

    /// Attempts belonging to one job, oldest first.
    pub fn for_job(&self, job_id: Uuid) -> Vec<AttemptRecord> {
        let buf = self.inner.lock();
        buf.iter().filter(|r| r.job_id == job_id).cloned().collect()
    }
}
