//! The retry driver every job runs through.
//!
//! Structured kinds (quiz, flashcards, checklist) are decoded and shape
//! checked, with malformed output retried a bounded number of times at the
//! same tier. Free-text kinds (chat, summary) take the reply as-is. Both
//! share the rate-limit and transport policy:
//!
//! - rate limited: move one tier down and retry immediately; at the last
//!   tier a background job halts with `rate_limited`, a foreground job
//!   waits out the advisory delay and retries there.
//! - HTTP or network failure: fixed backoff, bounded by
//!   `jobs.max_transport_retries` consecutive failures.
//!
//! Every attempt and every wait races the job's cancel token.

use lq_domain::artifact::ArtifactKind;
use lq_domain::config::JobsConfig;
use lq_domain::job::{GenerationJob, JobResult};
use lq_domain::trace::TraceEvent;
use lq_providers::cascade::{self, TierAdvance};
use lq_providers::{CascadeExecutor, Outcome};
use std::sync::Arc;
use std::time::Duration;

use crate::control::{JobControl, Progress, WaitReason};
use crate::parse::locate_structured;
use crate::validate::validate_shape;

/// How a job's loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    Completed(JobResult),
    /// Rate limited at the last tier while in the background.
    RateLimitHalted { retry_after_secs: u64 },
    Fatal(String),
    Cancelled,
}

/// Decode structured model text into validated records.
pub fn decode_structured(
    kind: ArtifactKind,
    text: &str,
    min_items: usize,
) -> Result<JobResult, String> {
    let parsed = locate_structured(text).map_err(|e| e.to_string())?;
    if parsed.repaired {
        tracing::debug!(
            kind = %kind,
            strategy = parsed.strategy.as_str(),
            "structured output needed a formatting repair"
        );
    }
    let records = validate_shape(kind, parsed.value, min_items).map_err(|e| e.to_string())?;
    Ok(JobResult::Records(records))
}

pub struct RepairLoop {
    executor: Arc<CascadeExecutor>,
    policy: JobsConfig,
}

impl RepairLoop {
    pub fn new(executor: Arc<CascadeExecutor>, policy: JobsConfig) -> Self {
        Self { executor, policy }
    }

    pub fn executor(&self) -> &Arc<CascadeExecutor> {
        &self.executor
    }

    pub fn policy(&self) -> &JobsConfig {
        &self.policy
    }

    /// Run `job` to an outcome, picking the decoder from its kind.
    pub async fn run(&self, job: &mut GenerationJob, control: &JobControl) -> LoopOutcome {
        if job.kind.is_structured() {
            let min_items = self.policy.min_items.for_kind(job.kind);
            self.drive(job, control, |kind, text| {
                decode_structured(kind, text, min_items)
            })
            .await
        } else {
            self.drive(job, control, |_, text| Ok(JobResult::Text(text.to_string())))
                .await
        }
    }

    async fn drive<F>(&self, job: &mut GenerationJob, control: &JobControl, decode: F) -> LoopOutcome
    where
        F: Fn(ArtifactKind, &str) -> Result<JobResult, String>,
    {
        let max_malformed = self.policy.max_malformed_retries;
        let transport_limit = self.policy.transport_retry_limit();
        let mut transport_failures = 0u32;
        let mut reason = String::from("initial");

        loop {
            if control.cancel_token().is_cancelled() {
                return LoopOutcome::Cancelled;
            }

            control.report(
                job,
                Progress::Attempt {
                    tier: job.current_tier,
                    model: self.executor.model_for(job.current_tier).to_string(),
                    attempt: job.attempt_count + 1,
                    reason: reason.clone(),
                },
            );

            let outcome = tokio::select! {
                biased;
                _ = control.cancel_token().cancelled() => return LoopOutcome::Cancelled,
                outcome = self.executor.attempt(job, &reason) => outcome,
            };

            match outcome {
                Outcome::Success(reply) => {
                    transport_failures = 0;
                    let err = match decode(job.kind, &reply.text) {
                        Ok(result) => return LoopOutcome::Completed(result),
                        Err(err) => err,
                    };

                    TraceEvent::MalformedOutput {
                        job_id: job.id.to_string(),
                        kind: job.kind,
                        retry: job.malformed_retry_count,
                        reason: err.clone(),
                    }
                    .emit();

                    if job.malformed_retry_count >= max_malformed {
                        return LoopOutcome::Fatal(format!(
                            "unparseable after {} retries: {err}",
                            job.malformed_retry_count
                        ));
                    }
                    job.malformed_retry_count += 1;
                    tracing::warn!(
                        job_id = %job.id,
                        kind = %job.kind,
                        retry = job.malformed_retry_count,
                        error = %err,
                        "malformed model output, retrying"
                    );

                    if !control
                        .wait(job, WaitReason::MalformedOutput, self.policy.malformed_backoff())
                        .await
                    {
                        return LoopOutcome::Cancelled;
                    }
                    reason = format!(
                        "retry {}/{} after malformed output",
                        job.malformed_retry_count, max_malformed
                    );
                }

                Outcome::RateLimited { retry_after_secs } => {
                    transport_failures = 0;
                    let tier = job.current_tier;
                    match cascade::advance(job) {
                        TierAdvance::Advanced { to, .. } => {
                            TraceEvent::RateLimited {
                                job_id: job.id.to_string(),
                                kind: job.kind,
                                tier,
                                retry_after_secs,
                                exhausted: false,
                            }
                            .emit();
                            reason = format!("rate limited on {tier}, trying {to}");
                        }
                        TierAdvance::Exhausted => {
                            TraceEvent::RateLimited {
                                job_id: job.id.to_string(),
                                kind: job.kind,
                                tier,
                                retry_after_secs,
                                exhausted: true,
                            }
                            .emit();

                            if control.is_background() {
                                job.rate_limited = true;
                                tracing::info!(
                                    job_id = %job.id,
                                    kind = %job.kind,
                                    retry_after_secs,
                                    "rate limited at last tier in background, halting"
                                );
                                return LoopOutcome::RateLimitHalted { retry_after_secs };
                            }

                            let wait = Duration::from_secs(retry_after_secs);
                            if !control.wait(job, WaitReason::RateLimit, wait).await {
                                return LoopOutcome::Cancelled;
                            }
                            reason = String::from("retry after rate-limit wait");
                        }
                    }
                }

                Outcome::HttpError { status, message } => {
                    transport_failures += 1;
                    tracing::warn!(job_id = %job.id, status, %message, failures = transport_failures, "model request failed");
                    if transport_limit.is_some_and(|limit| transport_failures >= limit) {
                        return LoopOutcome::Fatal(format!(
                            "gave up after {transport_failures} consecutive failures: HTTP {status} {message}"
                        ));
                    }
                    if !control
                        .wait(job, WaitReason::Transport, self.policy.transport_backoff())
                        .await
                    {
                        return LoopOutcome::Cancelled;
                    }
                    reason = format!("retry after HTTP {status}");
                }

                Outcome::NetworkError(message) => {
                    transport_failures += 1;
                    tracing::warn!(job_id = %job.id, %message, failures = transport_failures, "model request did not complete");
                    if transport_limit.is_some_and(|limit| transport_failures >= limit) {
                        return LoopOutcome::Fatal(format!(
                            "gave up after {transport_failures} consecutive failures: {message}"
                        ));
                    }
                    if !control
                        .wait(job, WaitReason::Transport, self.policy.transport_backoff())
                        .await
                    {
                        return LoopOutcome::Cancelled;
                    }
                    reason = String::from("retry after network error");
                }
            }
        }
    }
}
