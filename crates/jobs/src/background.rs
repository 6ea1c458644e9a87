//! Background continuation.
//!
//! One slot per artifact kind tracks the active job. A job starts in the
//! foreground; dismissing it moves it to the background without touching its
//! task or cancel token. Where the result goes depends on where the job is
//! when it finishes:
//!
//! - foreground: delivered to the [`JobHandle`] (`Consumed`), or cached when
//!   no handle is listening any more.
//! - background: written to the kind's [`CachedArtifact`] slot
//!   (`CachedReady`) and handed out by the next [`ContinuationManager::open`].
//!
//! Failures and rate-limit halts stay in the slot until the user opens that
//! kind again.
//!
//! Every transition and progress report is pushed to [`subscribe`]rs as a
//! [`StatusSnapshot`].
//!
//! [`subscribe`]: ContinuationManager::subscribe

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use lq_domain::artifact::ArtifactKind;
use lq_domain::config::EtaSecs;
use lq_domain::job::{GenerationJob, JobResult, JobState};
use lq_domain::tier::ModelTier;
use lq_domain::trace::TraceEvent;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::control::{JobControl, Progress, ProgressSink, WaitReason};
use crate::error::SubmitError;
use crate::repair_loop::LoopOutcome;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcomes and handles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Final result delivered to a foreground [`JobHandle`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(JobResult),
    Failed(String),
    Cancelled,
}

/// The caller's view of a submitted job.
pub struct JobHandle {
    job_id: Uuid,
    kind: ArtifactKind,
    rx: watch::Receiver<Option<JobOutcome>>,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The outcome, if the job already finished in the foreground.
    pub fn outcome(&self) -> Option<JobOutcome> {
        self.rx.borrow().clone()
    }

    /// Wait for the job to finish in the foreground.
    ///
    /// Resolves to `None` when the job left its slot without delivering to
    /// handles, i.e. it finished in the background and its result is cached.
    pub async fn wait(&mut self) -> Option<JobOutcome> {
        loop {
            if let Some(outcome) = self.rx.borrow_and_update().clone() {
                return Some(outcome);
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}

/// A completed result kept after its job was dismissed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedArtifact {
    pub kind: ArtifactKind,
    pub job_id: Uuid,
    pub result: JobResult,
    pub completed_at: DateTime<Utc>,
}

/// What the user finds when re-engaging a kind.
pub enum Reopened {
    Idle,
    /// The active job, now in the foreground.
    Running(JobHandle),
    /// The cached result, now consumed.
    Ready(CachedArtifact),
    /// The job failed while nobody was watching.
    Failed(String),
    /// The job halted at the last tier; the user has to decide how to go on.
    RateLimitDecision { retry_after_secs: u64 },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Status surface
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Idle,
    Generating,
    Ready,
    RateLimited,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub kind: ArtifactKind,
    pub state: StatusState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub background: bool,
    /// Seconds until the result is expected, or until a wait ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
    pub rate_limited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<ModelTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusSnapshot {
    fn idle(kind: ArtifactKind) -> Self {
        Self {
            kind,
            state: StatusState::Idle,
            job_id: None,
            background: false,
            eta_seconds: None,
            rate_limited: false,
            tier: None,
            message: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slots
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-kind record of the active (or halted/failed) job.
///
/// `state` is one of Foreground, Background, RateLimited, Failed; terminal
/// and cached jobs leave the map.
struct Slot {
    job_id: Uuid,
    state: JobState,
    cancel: CancelToken,
    background: Arc<AtomicBool>,
    outcome_tx: watch::Sender<Option<JobOutcome>>,
    started_at: Instant,
    eta_secs: u64,
    tier: ModelTier,
    wait: Option<(WaitReason, Instant)>,
    status_line: Option<String>,
    error: Option<String>,
    retry_after_secs: Option<u64>,
    halted: Option<GenerationJob>,
}

impl Slot {
    /// Seconds left of a halted job's advisory delay.
    fn halt_remaining_secs(&self, now: Instant) -> u64 {
        match self.wait {
            Some((WaitReason::RateLimit, until)) => ceil_secs(until.saturating_duration_since(now)),
            _ => self.retry_after_secs.unwrap_or_default(),
        }
    }

    fn handle(&self, kind: ArtifactKind) -> JobHandle {
        JobHandle {
            job_id: self.job_id,
            kind,
            rx: self.outcome_tx.subscribe(),
        }
    }
}

/// Routes a job's progress reports back to its slot.
struct SlotProgress {
    manager: Weak<ContinuationManager>,
}

impl ProgressSink for SlotProgress {
    fn progress(&self, job_id: Uuid, kind: ArtifactKind, progress: Progress) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_progress(job_id, kind, progress);
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ContinuationManager {
    slots: Mutex<HashMap<ArtifactKind, Slot>>,
    cache: Mutex<HashMap<ArtifactKind, CachedArtifact>>,
    events: broadcast::Sender<StatusSnapshot>,
    eta: EtaSecs,
}

impl ContinuationManager {
    pub fn new(eta: EtaSecs) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            events: broadcast::channel(128).0,
            eta,
        }
    }

    /// Status snapshots pushed on every transition, progress report and wait.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.events.subscribe()
    }

    /// Register `job` in the foreground and spawn `work` for it.
    ///
    /// `work` receives the job and its control and hands the job back with
    /// the loop outcome. Fails when the kind already has an active job or a
    /// pending rate-limit decision; a failed slot is replaced.
    pub fn launch<F, Fut>(
        self: &Arc<Self>,
        mut job: GenerationJob,
        work: F,
    ) -> Result<JobHandle, SubmitError>
    where
        F: FnOnce(GenerationJob, JobControl) -> Fut,
        Fut: Future<Output = (GenerationJob, LoopOutcome)> + Send + 'static,
    {
        let kind = job.kind;
        let (handle, control, replaced) = {
            let mut slots = self.slots.lock();
            let replaced = match slots.get(&kind).map(|s| s.state) {
                Some(state) if state.is_active() => return Err(SubmitError::AlreadyRunning(kind)),
                Some(JobState::RateLimited) => {
                    return Err(SubmitError::RateLimitDecisionPending(kind))
                }
                other => other,
            };

            let cancel = CancelToken::new();
            let background = Arc::new(AtomicBool::new(false));
            let (outcome_tx, rx) = watch::channel(None);
            job.state = JobState::Foreground;
            job.background = false;

            slots.insert(
                kind,
                Slot {
                    job_id: job.id,
                    state: JobState::Foreground,
                    cancel: cancel.clone(),
                    background: background.clone(),
                    outcome_tx,
                    started_at: Instant::now(),
                    eta_secs: self.eta.for_kind(kind),
                    tier: job.current_tier,
                    wait: None,
                    status_line: None,
                    error: None,
                    retry_after_secs: None,
                    halted: None,
                },
            );

            let sink = Arc::new(SlotProgress {
                manager: Arc::downgrade(self),
            });
            let control = JobControl::new(cancel, background, sink);
            let handle = JobHandle {
                job_id: job.id,
                kind,
                rx,
            };
            (handle, control, replaced)
        };

        if replaced == Some(JobState::Failed) {
            tracing::debug!(kind = %kind, "replacing failed job");
        }
        transition(&job, None, JobState::Foreground);
        self.publish(kind);

        let span = tracing::info_span!("job", job_id = %job.id, kind = %kind);
        let fut = work(job, control);
        let manager = Arc::clone(self);
        tokio::spawn(tracing::Instrument::instrument(
            async move {
                let (job, outcome) = fut.await;
                manager.finish(job, outcome);
            },
            span,
        ));

        Ok(handle)
    }

    /// Hand back the running job for `kind`, bringing it to the foreground.
    ///
    /// `Ok(None)` when nothing is running. A foreground job cannot be joined
    /// a second time.
    pub fn rejoin(&self, kind: ArtifactKind) -> Result<Option<JobHandle>, SubmitError> {
        let handle = {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(&kind) else {
                return Ok(None);
            };
            match slot.state {
                JobState::Foreground => return Err(SubmitError::AlreadyRunning(kind)),
                JobState::RateLimited => return Err(SubmitError::RateLimitDecisionPending(kind)),
                JobState::Background => {
                    bring_to_foreground(kind, slot);
                    slot.handle(kind)
                }
                _ => return Ok(None),
            }
        };
        self.publish(kind);
        Ok(Some(handle))
    }

    /// Move the foreground job of `kind` to the background. Its task keeps
    /// running; it is no longer cancellable.
    pub fn dismiss(&self, kind: ArtifactKind) -> bool {
        {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(&kind) else {
                return false;
            };
            if slot.state != JobState::Foreground {
                return false;
            }
            slot.state = JobState::Background;
            slot.background.store(true, Ordering::Release);
            transition_id(slot.job_id, kind, Some(JobState::Foreground), JobState::Background);
        }
        self.publish(kind);
        true
    }

    /// Re-engage `kind`: resume the active job in the foreground, consume the
    /// cached result, or surface a failure or rate-limit halt.
    pub fn open(&self, kind: ArtifactKind) -> Reopened {
        let reopened = {
            let mut slots = self.slots.lock();
            match slots.get(&kind).map(|s| s.state) {
                Some(JobState::Foreground) => slots.get(&kind).map(|s| Reopened::Running(s.handle(kind))),
                Some(JobState::Background) => slots.get_mut(&kind).map(|slot| {
                    bring_to_foreground(kind, slot);
                    Reopened::Running(slot.handle(kind))
                }),
                Some(JobState::RateLimited) => slots.get(&kind).map(|s| Reopened::RateLimitDecision {
                    retry_after_secs: s.halt_remaining_secs(Instant::now()),
                }),
                Some(_) => slots.remove(&kind).map(|slot| {
                    Reopened::Failed(slot.error.unwrap_or_else(|| "job failed".into()))
                }),
                None => None,
            }
        };

        let reopened = match reopened {
            Some(r) => r,
            None => match self.consume_cached(kind) {
                Some(artifact) => Reopened::Ready(artifact),
                None => Reopened::Idle,
            },
        };
        self.publish(kind);
        reopened
    }

    /// Take the cached result for `kind`, leaving the slot empty.
    pub fn consume_cached(&self, kind: ArtifactKind) -> Option<CachedArtifact> {
        let artifact = self.cache.lock().remove(&kind)?;
        transition_id(
            artifact.job_id,
            kind,
            Some(JobState::CachedReady),
            JobState::Consumed,
        );
        Some(artifact)
    }

    /// Peek at the cached result for `kind`.
    pub fn cached(&self, kind: ArtifactKind) -> Option<CachedArtifact> {
        self.cache.lock().get(&kind).cloned()
    }

    /// Cancel the foreground job of `kind` (optionally only if it is
    /// `job_id`). Background jobs ignore cancellation.
    pub fn cancel(&self, kind: ArtifactKind, job_id: Option<Uuid>) -> bool {
        let slots = self.slots.lock();
        let Some(slot) = slots.get(&kind) else {
            return false;
        };
        if job_id.is_some_and(|id| id != slot.job_id) {
            return false;
        }
        if slot.state != JobState::Foreground {
            tracing::debug!(kind = %kind, state = slot.state.as_str(), "cancel ignored");
            return false;
        }
        slot.cancel.cancel();
        true
    }

    /// Remove a rate-limit-halted job so it can be relaunched, along with
    /// the seconds left of its advisory delay.
    pub fn take_halted(&self, kind: ArtifactKind) -> Option<(GenerationJob, u64)> {
        let mut slots = self.slots.lock();
        if slots.get(&kind).map(|s| s.state) != Some(JobState::RateLimited) {
            return None;
        }
        let slot = slots.remove(&kind)?;
        let remaining = slot.halt_remaining_secs(Instant::now());
        let job = slot.halted?;
        Some((job, remaining))
    }

    /// Give up on a rate-limit-halted job. The kind reports `Failed` until
    /// it is opened or resubmitted.
    pub fn decline_halted(&self, kind: ArtifactKind) -> bool {
        {
            let mut slots = self.slots.lock();
            let Some(slot) = slots
                .get_mut(&kind)
                .filter(|s| s.state == JobState::RateLimited)
            else {
                return false;
            };
            slot.state = JobState::Failed;
            slot.wait = None;
            slot.error = Some("rate limited on every model; retry declined".into());
            if let Some(job) = slot.halted.as_mut() {
                job.state = JobState::Failed;
            }
            transition_id(slot.job_id, kind, Some(JobState::RateLimited), JobState::Failed);
        }
        self.publish(kind);
        true
    }

    pub fn status(&self, kind: ArtifactKind) -> StatusSnapshot {
        let slots = self.slots.lock();
        let Some(slot) = slots.get(&kind) else {
            let mut snap = StatusSnapshot::idle(kind);
            if let Some(artifact) = self.cache.lock().get(&kind) {
                snap.state = StatusState::Ready;
                snap.job_id = Some(artifact.job_id);
            }
            return snap;
        };

        let now = Instant::now();
        let active_wait = slot.wait.filter(|(_, until)| *until > now);
        let (state, eta_seconds) = match slot.state {
            state if state.is_active() => {
                let eta = match active_wait {
                    Some((_, until)) => ceil_secs(until - now),
                    None => slot
                        .eta_secs
                        .saturating_sub((now - slot.started_at).as_secs())
                        .max(1),
                };
                (StatusState::Generating, Some(eta))
            }
            JobState::RateLimited => {
                (StatusState::RateLimited, Some(slot.halt_remaining_secs(now)))
            }
            _ => (StatusState::Failed, None),
        };
        let rate_limited = slot.state == JobState::RateLimited
            || matches!(active_wait, Some((WaitReason::RateLimit, _)));

        StatusSnapshot {
            kind,
            state,
            job_id: Some(slot.job_id),
            background: slot.state == JobState::Background,
            eta_seconds,
            rate_limited,
            tier: Some(slot.tier),
            message: slot.error.clone().or_else(|| slot.status_line.clone()),
        }
    }

    pub fn status_all(&self) -> Vec<StatusSnapshot> {
        ArtifactKind::ALL.iter().map(|k| self.status(*k)).collect()
    }

    // ── Internal ───────────────────────────────────────────────────

    fn publish(&self, kind: ArtifactKind) {
        let snap = self.status(kind);
        let _ = self.events.send(snap);
    }

    fn on_progress(&self, job_id: Uuid, kind: ArtifactKind, progress: Progress) {
        {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(&kind).filter(|s| s.job_id == job_id) else {
                return;
            };
            match progress {
                Progress::Attempt {
                    tier,
                    model,
                    attempt,
                    reason,
                } => {
                    slot.tier = tier;
                    slot.wait = None;
                    slot.status_line = Some(format!(
                        "attempt {attempt} on {model} ({tier}), {reason}"
                    ));
                }
                Progress::Waiting { reason, duration } => {
                    slot.wait = Some((reason, Instant::now() + duration));
                }
            }
        }
        self.publish(kind);
    }

    /// Record the end of a job's loop.
    fn finish(&self, mut job: GenerationJob, outcome: LoopOutcome) {
        let kind = job.kind;
        {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(&kind).filter(|s| s.job_id == job.id) else {
                tracing::warn!(job_id = %job.id, kind = %kind, "finished job has no slot");
                return;
            };
            let from = slot.state;
            job.background = from == JobState::Background;

            match outcome {
                LoopOutcome::Completed(result) => {
                    let delivered = from == JobState::Foreground
                        && slot
                            .outcome_tx
                            .send(Some(JobOutcome::Completed(result.clone())))
                            .is_ok();
                    let to = if delivered {
                        // The newer result supersedes any older cached one.
                        if let Some(stale) = self.cache.lock().remove(&kind) {
                            tracing::debug!(
                                kind = %kind,
                                stale_job_id = %stale.job_id,
                                "dropped superseded cached result"
                            );
                        }
                        JobState::Consumed
                    } else {
                        self.cache.lock().insert(
                            kind,
                            CachedArtifact {
                                kind,
                                job_id: job.id,
                                result: result.clone(),
                                completed_at: Utc::now(),
                            },
                        );
                        JobState::CachedReady
                    };
                    job.result = Some(result);
                    job.state = to;
                    slots.remove(&kind);
                    transition(&job, Some(from), to);
                }
                LoopOutcome::Fatal(message) => {
                    tracing::warn!(job_id = %job.id, kind = %kind, %message, "job failed");
                    if from == JobState::Foreground {
                        let _ = slot.outcome_tx.send(Some(JobOutcome::Failed(message.clone())));
                    }
                    slot.state = JobState::Failed;
                    slot.error = Some(message);
                    slot.wait = None;
                    job.state = JobState::Failed;
                    transition(&job, Some(from), JobState::Failed);
                }
                LoopOutcome::Cancelled => {
                    let _ = slot.outcome_tx.send(Some(JobOutcome::Cancelled));
                    slots.remove(&kind);
                    job.state = JobState::Cancelled;
                    transition(&job, Some(from), JobState::Cancelled);
                }
                LoopOutcome::RateLimitHalted { retry_after_secs } => {
                    job.rate_limited = true;
                    job.state = JobState::RateLimited;
                    transition(&job, Some(from), JobState::RateLimited);
                    slot.state = JobState::RateLimited;
                    slot.retry_after_secs = Some(retry_after_secs);
                    slot.wait = Some((
                        WaitReason::RateLimit,
                        Instant::now() + std::time::Duration::from_secs(retry_after_secs),
                    ));
                    slot.halted = Some(job);
                }
            }
        }
        self.publish(kind);
    }
}

fn bring_to_foreground(kind: ArtifactKind, slot: &mut Slot) {
    slot.state = JobState::Foreground;
    slot.background.store(false, Ordering::Release);
    transition_id(slot.job_id, kind, Some(JobState::Background), JobState::Foreground);
}

fn ceil_secs(d: std::time::Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn transition(job: &GenerationJob, from: Option<JobState>, to: JobState) {
    transition_id(job.id, job.kind, from, to);
}

fn transition_id(job_id: Uuid, kind: ArtifactKind, from: Option<JobState>, to: JobState) {
    TraceEvent::JobTransition {
        job_id: job_id.to_string(),
        kind,
        from,
        to,
    }
    .emit();
    tracing::debug!(
        %job_id,
        kind = %kind,
        from = from.map(JobState::as_str),
        to = to.as_str(),
        terminal = to.is_terminal(),
        "job transition"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use lq_domain::content::GenerationPayload;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn manager() -> Arc<ContinuationManager> {
        Arc::new(ContinuationManager::new(EtaSecs::default()))
    }

    fn job(kind: ArtifactKind) -> GenerationJob {
        GenerationJob::new(kind, GenerationPayload::default(), ModelTier::Primary)
    }

    /// Launch a job whose outcome is supplied later through the returned sender.
    fn launch_gated(
        m: &Arc<ContinuationManager>,
        kind: ArtifactKind,
    ) -> (JobHandle, oneshot::Sender<LoopOutcome>) {
        let (tx, rx) = oneshot::channel();
        let handle = m
            .launch(job(kind), move |job, _control| async move {
                let outcome = rx.await.unwrap_or(LoopOutcome::Cancelled);
                (job, outcome)
            })
            .unwrap();
        (handle, tx)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn foreground_completion_is_delivered_not_cached() {
        let m = manager();
        let (mut handle, tx) = launch_gated(&m, ArtifactKind::Summary);
        assert_eq!(m.status(ArtifactKind::Summary).state, StatusState::Generating);

        tx.send(LoopOutcome::Completed(JobResult::Text("done".into())))
            .unwrap();
        assert_eq!(
            handle.wait().await,
            Some(JobOutcome::Completed(JobResult::Text("done".into())))
        );
        settle().await;
        assert!(m.cached(ArtifactKind::Summary).is_none());
        assert_eq!(m.status(ArtifactKind::Summary).state, StatusState::Idle);
    }

    #[tokio::test]
    async fn background_completion_is_cached_then_consumed_once() {
        let m = manager();
        let (mut handle, tx) = launch_gated(&m, ArtifactKind::Quiz);
        assert!(m.dismiss(ArtifactKind::Quiz));
        assert!(m.status(ArtifactKind::Quiz).background);

        let result = JobResult::Records(vec![serde_json::json!({"q": 1})]);
        tx.send(LoopOutcome::Completed(result.clone())).unwrap();
        assert_eq!(handle.wait().await, None);

        assert_eq!(m.status(ArtifactKind::Quiz).state, StatusState::Ready);
        match m.open(ArtifactKind::Quiz) {
            Reopened::Ready(artifact) => assert_eq!(artifact.result, result),
            _ => panic!("expected cached result"),
        }
        assert!(m.cached(ArtifactKind::Quiz).is_none());
        assert!(matches!(m.open(ArtifactKind::Quiz), Reopened::Idle));
    }

    #[tokio::test]
    async fn dropped_handle_caches_foreground_result() {
        let m = manager();
        let (handle, tx) = launch_gated(&m, ArtifactKind::Chat);
        drop(handle);
        tx.send(LoopOutcome::Completed(JobResult::Text("hi".into())))
            .unwrap();
        settle().await;
        assert!(m.cached(ArtifactKind::Chat).is_some());
    }

    #[tokio::test]
    async fn second_launch_for_active_kind_is_rejected() {
        let m = manager();
        let (_handle, _tx) = launch_gated(&m, ArtifactKind::Checklist);
        let err = m
            .launch(job(ArtifactKind::Checklist), |job, _| async move {
                (job, LoopOutcome::Cancelled)
            })
            .err();
        assert_eq!(err, Some(SubmitError::AlreadyRunning(ArtifactKind::Checklist)));

        // Other kinds are independent.
        let (_other, _tx2) = launch_gated(&m, ArtifactKind::Quiz);
    }

    #[tokio::test]
    async fn cancel_only_applies_in_foreground() {
        let m = manager();
        let (handle, _tx) = launch_gated(&m, ArtifactKind::Flashcards);
        assert!(m.dismiss(ArtifactKind::Flashcards));
        assert!(!m.cancel(ArtifactKind::Flashcards, Some(handle.job_id())));

        let slots = m.slots.lock();
        assert!(!slots[&ArtifactKind::Flashcards].cancel.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_checks_job_id() {
        let m = manager();
        let (_handle, _tx) = launch_gated(&m, ArtifactKind::Flashcards);
        assert!(!m.cancel(ArtifactKind::Flashcards, Some(Uuid::new_v4())));
        assert!(m.cancel(ArtifactKind::Flashcards, None));
    }

    #[tokio::test]
    async fn rejoin_brings_background_job_forward() {
        let m = manager();
        let (first, _tx) = launch_gated(&m, ArtifactKind::Quiz);
        m.dismiss(ArtifactKind::Quiz);
        let again = m.rejoin(ArtifactKind::Quiz).unwrap().unwrap();
        assert_eq!(again.job_id(), first.job_id());
        assert!(!m.status(ArtifactKind::Quiz).background);
        assert_eq!(
            m.rejoin(ArtifactKind::Quiz).err(),
            Some(SubmitError::AlreadyRunning(ArtifactKind::Quiz))
        );
    }

    #[tokio::test]
    async fn background_failure_surfaces_on_open() {
        let m = manager();
        let (_handle, tx) = launch_gated(&m, ArtifactKind::Checklist);
        m.dismiss(ArtifactKind::Checklist);
        tx.send(LoopOutcome::Fatal("unparseable after 5 retries".into()))
            .unwrap();
        settle().await;

        let status = m.status(ArtifactKind::Checklist);
        assert_eq!(status.state, StatusState::Failed);
        assert_eq!(status.message.as_deref(), Some("unparseable after 5 retries"));
        match m.open(ArtifactKind::Checklist) {
            Reopened::Failed(msg) => assert!(msg.contains("unparseable")),
            _ => panic!("expected failure"),
        }
        assert_eq!(m.status(ArtifactKind::Checklist).state, StatusState::Idle);
    }

    #[tokio::test]
    async fn halted_job_waits_for_decision() {
        let m = manager();
        let (_handle, tx) = launch_gated(&m, ArtifactKind::Quiz);
        m.dismiss(ArtifactKind::Quiz);
        tx.send(LoopOutcome::RateLimitHalted {
            retry_after_secs: 30,
        })
        .unwrap();
        settle().await;

        let status = m.status(ArtifactKind::Quiz);
        assert_eq!(status.state, StatusState::RateLimited);
        assert!(status.rate_limited);
        assert_eq!(status.eta_seconds, Some(30));
        assert!(matches!(
            m.open(ArtifactKind::Quiz),
            Reopened::RateLimitDecision {
                retry_after_secs: 30
            }
        ));

        let (job, wait) = m.take_halted(ArtifactKind::Quiz).unwrap();
        assert!(job.rate_limited);
        assert_eq!(job.state, JobState::RateLimited);
        assert_eq!(wait, 30);
        assert!(m.take_halted(ArtifactKind::Quiz).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn halted_status_counts_down() {
        let m = manager();
        let (_handle, tx) = launch_gated(&m, ArtifactKind::Flashcards);
        m.dismiss(ArtifactKind::Flashcards);
        tx.send(LoopOutcome::RateLimitHalted {
            retry_after_secs: 30,
        })
        .unwrap();
        settle().await;

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(m.status(ArtifactKind::Flashcards).eta_seconds, Some(18));
        let (_, wait) = m.take_halted(ArtifactKind::Flashcards).unwrap();
        assert_eq!(wait, 18);
    }

    #[tokio::test]
    async fn declined_halt_fails_until_opened() {
        let m = manager();
        let (_handle, tx) = launch_gated(&m, ArtifactKind::Quiz);
        m.dismiss(ArtifactKind::Quiz);
        assert!(!m.decline_halted(ArtifactKind::Quiz));
        tx.send(LoopOutcome::RateLimitHalted {
            retry_after_secs: 10,
        })
        .unwrap();
        settle().await;

        assert!(m.decline_halted(ArtifactKind::Quiz));
        let status = m.status(ArtifactKind::Quiz);
        assert_eq!(status.state, StatusState::Failed);
        assert!(!status.rate_limited);
        assert!(m.take_halted(ArtifactKind::Quiz).is_none());
        match m.open(ArtifactKind::Quiz) {
            Reopened::Failed(msg) => assert!(msg.contains("declined"), "{msg}"),
            _ => panic!("expected failure"),
        }
        assert_eq!(m.status(ArtifactKind::Quiz).state, StatusState::Idle);
    }

    #[tokio::test]
    async fn foreground_result_supersedes_cached_one() {
        let m = manager();
        let (_old, tx) = launch_gated(&m, ArtifactKind::Flashcards);
        m.dismiss(ArtifactKind::Flashcards);
        tx.send(LoopOutcome::Completed(JobResult::Text("old".into())))
            .unwrap();
        settle().await;
        assert_eq!(m.status(ArtifactKind::Flashcards).state, StatusState::Ready);

        let (mut new, tx) = launch_gated(&m, ArtifactKind::Flashcards);
        tx.send(LoopOutcome::Completed(JobResult::Text("new".into())))
            .unwrap();
        assert_eq!(
            new.wait().await,
            Some(JobOutcome::Completed(JobResult::Text("new".into())))
        );
        settle().await;
        assert!(m.cached(ArtifactKind::Flashcards).is_none());
        assert_eq!(m.status(ArtifactKind::Flashcards).state, StatusState::Idle);
        assert!(matches!(m.open(ArtifactKind::Flashcards), Reopened::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn status_counts_down_during_waits() {
        let m = manager();
        let (tx, rx) = oneshot::channel::<()>();
        m.launch(job(ArtifactKind::Chat), move |job, control| async move {
            control
                .wait(&job, WaitReason::RateLimit, Duration::from_secs(20))
                .await;
            let _ = rx.await;
            (job, LoopOutcome::Cancelled)
        })
        .unwrap();

        settle().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        let status = m.status(ArtifactKind::Chat);
        assert_eq!(status.eta_seconds, Some(15));
        assert!(status.rate_limited);
        drop(tx);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let m = manager();
        let mut rx = m.subscribe();
        let (_handle, tx) = launch_gated(&m, ArtifactKind::Summary);
        assert_eq!(rx.recv().await.unwrap().state, StatusState::Generating);
        m.dismiss(ArtifactKind::Summary);
        assert!(rx.recv().await.unwrap().background);
        tx.send(LoopOutcome::Completed(JobResult::Text("s".into())))
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().state, StatusState::Ready);
    }
}
