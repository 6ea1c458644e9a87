//! Single-attempt model execution.
//!
//! [`CascadeExecutor::attempt`] issues one request at the job's current tier
//! and classifies the reply. It never retries and never changes the tier;
//! that policy belongs to the caller.

use crate::attempt_log::{AttemptLog, AttemptRecord};
use crate::response::{candidate_text, retry_after_secs, ErrorEnvelope};
use crate::traits::{ModelTransport, RawResponse};
use chrono::Utc;
use lq_domain::config::{JobsConfig, LlmConfig, TierModels};
use lq_domain::content::GenerationRequest;
use lq_domain::job::GenerationJob;
use lq_domain::tier::ModelTier;
use lq_domain::trace::TraceEvent;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest slice of an error body kept in [`Outcome::HttpError`].
const MAX_ERROR_BODY: usize = 500;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Text produced by a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub model: String,
    pub tier: ModelTier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(ModelReply),
    /// HTTP 429 or a `RESOURCE_EXHAUSTED` envelope.
    RateLimited { retry_after_secs: u64 },
    /// Any other non-OK reply.
    HttpError { status: u16, message: String },
    /// No HTTP reply at all: connect failure, broken body, or timeout.
    NetworkError(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::RateLimited { .. } => "rate_limited",
            Outcome::HttpError { .. } => "http_error",
            Outcome::NetworkError(_) => "network_error",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Executor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CascadeExecutor {
    transport: Arc<dyn ModelTransport>,
    tiers: TierModels,
    timeout: Duration,
    default_wait_secs: u64,
    min_wait_secs: u64,
    log: Arc<AttemptLog>,
}

impl CascadeExecutor {
    pub fn new(transport: Arc<dyn ModelTransport>, llm: &LlmConfig, jobs: &JobsConfig) -> Self {
        Self {
            transport,
            tiers: llm.tiers.clone(),
            timeout: Duration::from_millis(llm.generate_timeout_ms),
            default_wait_secs: jobs.default_rate_limit_wait_secs,
            min_wait_secs: jobs.min_rate_limit_wait_secs,
            log: Arc::new(AttemptLog::new(jobs.attempt_log_capacity)),
        }
    }

    pub fn transport(&self) -> &Arc<dyn ModelTransport> {
        &self.transport
    }

    pub fn attempt_log(&self) -> &Arc<AttemptLog> {
        &self.log
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        self.tiers.model_for(tier)
    }

    /// Issue one request for `job` at its current tier.
    ///
    /// Bumps `attempt_count`, records a status line, and bounds the call by
    /// the generation timeout (a timeout is a [`Outcome::NetworkError`]).
    pub async fn attempt(&self, job: &mut GenerationJob, reason: &str) -> Outcome {
        job.attempt_count += 1;
        let tier = job.current_tier;
        let model = self.tiers.model_for(tier).to_string();

        let record = AttemptRecord {
            timestamp: Utc::now(),
            job_id: job.id,
            kind: job.kind,
            tier,
            model: model.clone(),
            attempt: job.attempt_count,
            reason: reason.to_string(),
        };
        job.last_status = Some(record.status_line());
        TraceEvent::ModelAttempt {
            job_id: job.id.to_string(),
            kind: job.kind,
            tier,
            model: model.clone(),
            attempt: job.attempt_count,
            reason: reason.to_string(),
        }
        .emit();
        self.log.record(record);

        let req = GenerationRequest {
            model: model.clone(),
            payload: job.payload.clone(),
        };

        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, self.transport.generate(&req)).await
        {
            Err(_) => Outcome::NetworkError(format!(
                "request timed out after {}s",
                self.timeout.as_secs()
            )),
            Ok(Err(e)) => Outcome::NetworkError(e.to_string()),
            Ok(Ok(raw)) => self.classify(&raw, &model, tier),
        };

        TraceEvent::ModelResponse {
            job_id: job.id.to_string(),
            model,
            outcome: outcome.label().into(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        outcome
    }

    /// Map a raw HTTP reply onto an [`Outcome`].
    pub fn classify(&self, raw: &RawResponse, model: &str, tier: ModelTier) -> Outcome {
        let envelope = ErrorEnvelope::parse(&raw.body);

        let exhausted = envelope.as_ref().is_some_and(|e| e.is_resource_exhausted());
        if raw.status == 429 || exhausted {
            let (message, delay) = envelope
                .as_ref()
                .map(|e| (e.message.as_str(), e.retry_delay_secs))
                .unwrap_or((raw.body.as_str(), None));
            return Outcome::RateLimited {
                retry_after_secs: retry_after_secs(
                    message,
                    delay,
                    self.default_wait_secs,
                    self.min_wait_secs,
                ),
            };
        }

        if let Some(env) = envelope {
            return Outcome::HttpError {
                status: env.code.unwrap_or(raw.status),
                message: truncate(&env.message),
            };
        }

        if !raw.is_success() {
            return Outcome::HttpError {
                status: raw.status,
                message: truncate(&raw.body),
            };
        }

        match candidate_text(&raw.body) {
            Ok(text) => Outcome::Success(ModelReply {
                text,
                model: model.to_string(),
                tier,
            }),
            Err(e) => Outcome::HttpError {
                status: raw.status,
                message: e.to_string(),
            },
        }
    }
}

fn truncate(s: &str) -> String {
    if s.len() <= MAX_ERROR_BODY {
        return s.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
