use lq_domain::artifact::ArtifactKind;

/// Why a job could not be started or resumed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("a {0} job is already running")]
    AlreadyRunning(ArtifactKind),
    #[error("{0} is rate limited on every model; choose to retry later or accept the lower tier")]
    RateLimitDecisionPending(ArtifactKind),
    #[error("no rate-limited {0} job to resume")]
    NothingToResume(ArtifactKind),
}
