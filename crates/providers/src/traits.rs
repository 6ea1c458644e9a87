use lq_domain::content::GenerationRequest;
use lq_domain::error::Result;
use serde::{Deserialize, Serialize};
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The undecoded reply of one generation call.
///
/// Transports hand back every HTTP response, success or not; classifying
/// it (rate limit, HTTP error, success) is the executor's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A file to push through the resumable upload protocol.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub display_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Metadata of an uploaded file, as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Resource name (`files/abc123`).
    pub name: String,
    /// URI to reference in `fileData` parts.
    pub uri: String,
    pub mime_type: String,
    /// Processing state (`PROCESSING`, `ACTIVE`, `FAILED`).
    pub state: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core transport trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Network primitive the orchestrator issues model requests through.
///
/// Implementations translate [`GenerationRequest`] into the service's wire
/// format. They never retry and never interpret error bodies.
#[async_trait::async_trait]
pub trait ModelTransport: Send + Sync {
    /// Send one generation request. `Err` means the request never produced
    /// an HTTP response (connect failure, timeout, broken body).
    async fn generate(&self, req: &GenerationRequest) -> Result<RawResponse>;

    /// Upload a file and wait until the service reports it usable.
    async fn upload(&self, req: UploadRequest) -> Result<UploadedFile>;

    /// A unique identifier for this transport instance.
    fn transport_id(&self) -> &str;
}
