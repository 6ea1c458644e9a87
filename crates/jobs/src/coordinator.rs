//! The façade the UI talks to.
//!
//! [`JobCoordinator`] wires the cascade executor, the repair loop, the
//! continuation manager and the slide-group engine together: it builds the
//! generation payload for each artifact kind (chat gets slide-scoped
//! history), enforces one active job per kind, and resolves rate-limit
//! decisions.

use std::sync::Arc;
use std::time::Duration;

use lq_domain::artifact::ArtifactKind;
use lq_domain::config::{Config, JobsConfig};
use lq_domain::content::{GenerationPayload, Part, Role, Turn};
use lq_domain::error::Result;
use lq_domain::job::{GenerationJob, JobResult};
use lq_domain::tier::ModelTier;
use lq_providers::cascade::starting_tier;
use lq_providers::{AttemptLog, CascadeExecutor, ModelTransport, UploadRequest};
use lq_slides::{Classification, FrameCapture, SlideGroupEngine, TextExtractor};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::background::{ContinuationManager, JobHandle, Reopened, StatusSnapshot};
use crate::control::WaitReason;
use crate::error::SubmitError;
use crate::repair_loop::{LoopOutcome, RepairLoop};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inputs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the caller supplies for one generation.
#[derive(Debug, Clone, Default)]
pub struct JobInput {
    pub prompt: String,
    pub system_instruction: Option<String>,
    /// Uploaded documents or captured frames, sent before the prompt.
    pub attachments: Vec<Part>,
    pub temperature: Option<f32>,
}

impl JobInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_attachment(mut self, part: Part) -> Self {
        self.attachments.push(part);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// The user's answer to a rate limit that exhausted every tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitChoice {
    /// Wait out the advisory delay and try again. Drops a downgrade made by
    /// an earlier `AcceptLowerTier`.
    RetryLater,
    /// Resume now on the last tier and keep starting there.
    AcceptLowerTier,
    /// Give up on the job; the kind shows as failed until it is opened.
    Decline,
}

/// Where new jobs start, and whether that came from a rate-limit decision.
#[derive(Debug, Clone, Copy, Default)]
struct TierPreference {
    tier: Option<ModelTier>,
    from_rate_limit: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Coordinator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct JobCoordinator {
    executor: Arc<CascadeExecutor>,
    repair: Arc<RepairLoop>,
    manager: Arc<ContinuationManager>,
    slides: Arc<Mutex<SlideGroupEngine>>,
    sticky: RwLock<TierPreference>,
}

impl JobCoordinator {
    pub fn new(config: &Config, transport: Arc<dyn ModelTransport>) -> Self {
        let executor = Arc::new(CascadeExecutor::new(transport, &config.llm, &config.jobs));
        Self::with_executor(executor, &config.jobs, SlideGroupEngine::new(config.slides.clone()))
    }

    pub fn with_executor(
        executor: Arc<CascadeExecutor>,
        jobs: &JobsConfig,
        slides: SlideGroupEngine,
    ) -> Self {
        Self {
            repair: Arc::new(RepairLoop::new(executor.clone(), jobs.clone())),
            manager: Arc::new(ContinuationManager::new(jobs.eta_secs.clone())),
            slides: Arc::new(Mutex::new(slides)),
            sticky: RwLock::new(TierPreference::default()),
            executor,
        }
    }

    // ── Submission ─────────────────────────────────────────────────

    /// Start a job for `kind`, or rejoin the one already running in the
    /// background.
    ///
    /// Fails while a foreground job of the same kind is in flight or a
    /// rate-limit decision is pending.
    pub fn submit(&self, kind: ArtifactKind, input: JobInput) -> std::result::Result<JobHandle, SubmitError> {
        if let Some(handle) = self.manager.rejoin(kind)? {
            tracing::info!(kind = %kind, job_id = %handle.job_id(), "rejoined background job");
            return Ok(handle);
        }

        let (payload, group_id) = self.build_payload(kind, &input);
        let job = GenerationJob::new(kind, payload, starting_tier(self.sticky_tier()));
        tracing::info!(
            kind = %kind,
            job_id = %job.id,
            tier = %job.current_tier,
            "submitting job"
        );
        self.spawn(job, group_id, None)
    }

    /// Answer a rate-limit halt at the last tier.
    ///
    /// Returns the resumed job's handle, or `None` when the job was declined.
    pub fn resolve_rate_limit(
        &self,
        kind: ArtifactKind,
        choice: RateLimitChoice,
    ) -> std::result::Result<Option<JobHandle>, SubmitError> {
        if choice == RateLimitChoice::Decline {
            if !self.manager.decline_halted(kind) {
                return Err(SubmitError::NothingToResume(kind));
            }
            tracing::info!(kind = %kind, "rate-limited job declined");
            return Ok(None);
        }

        let (mut job, wait_secs) = self
            .manager
            .take_halted(kind)
            .ok_or(SubmitError::NothingToResume(kind))?;
        job.rate_limited = false;

        let initial_wait = match choice {
            RateLimitChoice::AcceptLowerTier => {
                *self.sticky.write() = TierPreference {
                    tier: Some(ModelTier::Tertiary),
                    from_rate_limit: true,
                };
                None
            }
            _ => {
                let mut pref = self.sticky.write();
                if pref.from_rate_limit {
                    *pref = TierPreference::default();
                }
                Some(Duration::from_secs(wait_secs))
            }
        };
        tracing::info!(kind = %kind, job_id = %job.id, ?choice, "resuming rate-limited job");

        let group_id = self.current_group_id(kind);
        self.spawn(job, group_id, initial_wait).map(Some)
    }

    fn spawn(
        &self,
        job: GenerationJob,
        group_id: Option<String>,
        initial_wait: Option<Duration>,
    ) -> std::result::Result<JobHandle, SubmitError> {
        let repair = Arc::clone(&self.repair);
        let slides = Arc::clone(&self.slides);

        self.manager.launch(job, move |mut job, control| async move {
            if let Some(wait) = initial_wait {
                if !control.wait(&job, WaitReason::RateLimit, wait).await {
                    return (job, LoopOutcome::Cancelled);
                }
            }

            let outcome = repair.run(&mut job, &control).await;

            if let (ArtifactKind::Chat, LoopOutcome::Completed(JobResult::Text(answer))) =
                (job.kind, &outcome)
            {
                let question = prompt_text(&job.payload);
                slides
                    .lock()
                    .record_exchange(group_id.as_deref(), &question, answer);
            }
            (job, outcome)
        })
    }

    fn build_payload(&self, kind: ArtifactKind, input: &JobInput) -> (GenerationPayload, Option<String>) {
        let mut contents = Vec::new();
        let mut group_id = None;

        if kind == ArtifactKind::Chat {
            let slides = self.slides.lock();
            let context = slides.context_messages(slides.config().slide_scoped);
            contents.extend(context.iter().map(|m| m.to_turn()));
            group_id = slides.current_group().map(|g| g.id().to_string());
        }

        let mut parts = input.attachments.clone();
        parts.push(Part::text(&input.prompt));
        contents.push(Turn::user(parts));

        let payload = GenerationPayload {
            system_instruction: input.system_instruction.clone(),
            contents,
            json_mode: kind.is_structured(),
            temperature: input.temperature,
        };
        (payload, group_id)
    }

    fn current_group_id(&self, kind: ArtifactKind) -> Option<String> {
        if kind != ArtifactKind::Chat {
            return None;
        }
        self.slides.lock().current_group().map(|g| g.id().to_string())
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Cancel the job behind `handle` if it is still in the foreground.
    pub fn cancel(&self, handle: &JobHandle) -> bool {
        self.manager.cancel(handle.kind(), Some(handle.job_id()))
    }

    pub fn cancel_kind(&self, kind: ArtifactKind) -> bool {
        self.manager.cancel(kind, None)
    }

    pub fn dismiss(&self, kind: ArtifactKind) -> bool {
        self.manager.dismiss(kind)
    }

    pub fn open(&self, kind: ArtifactKind) -> Reopened {
        self.manager.open(kind)
    }

    pub fn status(&self, kind: ArtifactKind) -> StatusSnapshot {
        self.manager.status(kind)
    }

    pub fn status_all(&self) -> Vec<StatusSnapshot> {
        self.manager.status_all()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.manager.subscribe()
    }

    pub fn attempt_log(&self) -> &Arc<AttemptLog> {
        self.executor.attempt_log()
    }

    // ── Tier preference ────────────────────────────────────────────

    pub fn sticky_tier(&self) -> Option<ModelTier> {
        self.sticky.read().tier
    }

    /// Make new jobs start at `tier` (`None` restores the top tier).
    pub fn set_sticky_tier(&self, tier: Option<ModelTier>) {
        *self.sticky.write() = TierPreference {
            tier,
            from_rate_limit: false,
        };
        tracing::info!(tier = tier.map(ModelTier::as_str), "sticky tier set");
    }

    // ── Slides ─────────────────────────────────────────────────────

    /// Capture a frame, OCR it and move the slide pointer.
    ///
    /// Capture and OCR run without holding the engine lock. A failed capture
    /// or OCR keeps the current slide.
    pub async fn observe_frame(
        &self,
        capture: &dyn FrameCapture,
        extractor: &dyn TextExtractor,
    ) -> Classification {
        let text = match lq_slides::read_slide_text(capture, extractor).await {
            Ok(text) => text.map(|(_, text)| text),
            Err(e) => {
                tracing::warn!(error = %e, "slide text unavailable, keeping current slide");
                None
            }
        };
        self.slides.lock().observe(text.as_deref())
    }

    pub fn observe_slide_text(&self, text: &str) -> Classification {
        self.slides.lock().classify_text(text)
    }

    /// Id of the slide group chat questions are currently scoped to.
    pub fn current_slide(&self) -> Option<String> {
        self.slides.lock().current_group().map(|g| g.id().to_string())
    }

    /// Messages recorded under slide group `group_id`.
    pub fn slide_messages(&self, group_id: &str) -> Vec<lq_domain::content::ChatMessage> {
        self.slides
            .lock()
            .group(group_id)
            .map(|g| g.messages().to_vec())
            .unwrap_or_default()
    }

    pub fn clear_conversation(&self) {
        self.slides.lock().clear();
    }

    // ── Attachments ────────────────────────────────────────────────

    /// Upload a document and return the part that references it.
    pub async fn upload_attachment(
        &self,
        display_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Part> {
        let file = self
            .executor
            .transport()
            .upload(UploadRequest {
                display_name: display_name.into(),
                mime_type: mime_type.into(),
                bytes,
            })
            .await?;
        Ok(Part::FileData {
            mime_type: file.mime_type,
            file_uri: file.uri,
        })
    }
}

/// Text of the last user turn (the question, without context or attachments).
fn prompt_text(payload: &GenerationPayload) -> String {
    payload
        .contents
        .iter()
        .rev()
        .find(|t| t.role == Role::User)
        .map(|t| {
            t.parts
                .iter()
                .filter_map(Part::as_text)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}
