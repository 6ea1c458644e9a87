use lq_domain::error::Result;
use serde::{Deserialize, Serialize};

/// A still image taken from the lecture video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFrame {
    pub mime_type: String,
    /// Base64-encoded image bytes.
    pub data_base64: String,
}

/// Source of video frames (host page capture).
#[async_trait::async_trait]
pub trait FrameCapture: Send + Sync {
    /// `None` when there is nothing to capture (no video, not playing yet).
    async fn capture_frame(&self) -> Result<Option<CapturedFrame>>;
}

/// OCR backend turning a frame into slide text.
#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, frame: &CapturedFrame) -> Result<String>;
}

/// Capture a frame and extract its text.
///
/// Returns the frame along with the text so callers can attach the image to
/// a request. `Ok(None)` when no frame was available.
pub async fn read_slide_text(
    capture: &dyn FrameCapture,
    extractor: &dyn TextExtractor,
) -> Result<Option<(CapturedFrame, String)>> {
    let Some(frame) = capture.capture_frame().await? else {
        tracing::debug!("no frame available for slide classification");
        return Ok(None);
    };
    let text = extractor.extract_text(&frame).await?;
    Ok(Some((frame, text)))
}
