pub mod attempt_log;
pub mod cascade;
pub mod executor;
pub mod google;
pub mod response;
pub mod traits;
pub(crate) mod util;

pub use attempt_log::{AttemptLog, AttemptRecord};
pub use cascade::{advance, starting_tier, TierAdvance};
pub use executor::{CascadeExecutor, ModelReply, Outcome};
pub use google::GeminiTransport;
pub use traits::{ModelTransport, RawResponse, UploadRequest, UploadedFile};
pub use util::resolve_api_key;
