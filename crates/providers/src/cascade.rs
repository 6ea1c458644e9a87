//! Tier-advance policy for the model cascade.
//!
//! A job walks `Primary -> Secondary -> Tertiary` one step at a time and
//! never moves back. Each new job starts over at the top unless a sticky
//! downgrade is in effect.

use lq_domain::job::GenerationJob;
use lq_domain::tier::ModelTier;
use lq_domain::trace::TraceEvent;

/// Result of trying to move a job one tier down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierAdvance {
    Advanced { from: ModelTier, to: ModelTier },
    /// Already at the last tier; the job keeps its tier.
    Exhausted,
}

/// The tier a fresh job starts at.
pub fn starting_tier(sticky: Option<ModelTier>) -> ModelTier {
    sticky.unwrap_or_default()
}

/// Advance `job` by exactly one tier.
pub fn advance(job: &mut GenerationJob) -> TierAdvance {
    let from = job.current_tier;
    let Some(to) = from.next() else {
        return TierAdvance::Exhausted;
    };

    job.current_tier = to;
    job.tier_history.push(to);
    TraceEvent::TierAdvanced {
        job_id: job.id.to_string(),
        kind: job.kind,
        from,
        to,
    }
    .emit();
    tracing::info!(job_id = %job.id, kind = %job.kind, %from, %to, "model tier advanced");

    TierAdvance::Advanced { from, to }
}
