//! Generation job orchestration: the malformed-output repair loop, the
//! background continuation manager and the coordinator tying them to the
//! model cascade and the slide-group engine.

pub mod background;
pub mod cancel;
pub mod control;
pub mod coordinator;
pub mod error;
pub mod parse;
pub mod repair_loop;
pub mod validate;

pub use background::{
    CachedArtifact, ContinuationManager, JobHandle, JobOutcome, Reopened, StatusSnapshot,
    StatusState,
};
pub use cancel::CancelToken;
pub use control::{JobControl, NoProgress, Progress, ProgressSink, WaitReason};
pub use coordinator::{JobCoordinator, JobInput, RateLimitChoice};
pub use error::SubmitError;
pub use parse::{locate_structured, ParseError, Parsed, Strategy};
pub use repair_loop::{decode_structured, LoopOutcome, RepairLoop};
pub use validate::{validate_shape, ShapeError};
