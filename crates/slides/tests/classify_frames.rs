//! End-to-end classification through the capture and OCR collaborators.

use lq_domain::config::SlidesConfig;
use lq_domain::error::{Error, Result};
use lq_slides::{CapturedFrame, FrameCapture, SlideGroupEngine, TextExtractor};
use std::sync::Mutex;

/// Yields one scripted frame per call; the "image" is the slide text itself.
struct ScriptedCapture {
    frames: Mutex<Vec<Option<String>>>,
}

impl ScriptedCapture {
    fn new(mut frames: Vec<Option<&str>>) -> Self {
        frames.reverse();
        Self {
            frames: Mutex::new(frames.into_iter().map(|f| f.map(String::from)).collect()),
        }
    }
}

#[async_trait::async_trait]
impl FrameCapture for ScriptedCapture {
    async fn capture_frame(&self) -> Result<Option<CapturedFrame>> {
        let next = self.frames.lock().unwrap().pop().flatten();
        Ok(next.map(|text| CapturedFrame {
            mime_type: "text/plain".into(),
            data_base64: text,
        }))
    }
}

struct EchoOcr;

#[async_trait::async_trait]
impl TextExtractor for EchoOcr {
    async fn extract_text(&self, frame: &CapturedFrame) -> Result<String> {
        Ok(frame.data_base64.clone())
    }
}

struct BrokenOcr;

#[async_trait::async_trait]
impl TextExtractor for BrokenOcr {
    async fn extract_text(&self, _frame: &CapturedFrame) -> Result<String> {
        Err(Error::Other("ocr engine unavailable".into()))
    }
}

#[tokio::test]
async fn lecture_walkthrough_groups_slides() {
    let capture = ScriptedCapture::new(vec![
        Some("derivative chain rule example"),
        Some("derivative chain rule, example 2"),
        Some("integration by parts"),
        None,
        Some("derivative chain rule example"),
    ]);
    let mut engine = SlideGroupEngine::new(SlidesConfig::default());

    let first = engine.classify(&capture, &EchoOcr).await;
    engine.record_exchange(Some(&first.group_id), "what does this show?", "the chain rule");

    let second = engine.classify(&capture, &EchoOcr).await;
    assert_eq!(second.group_id, first.group_id);
    assert!(!second.changed);
    assert_eq!(engine.group(&first.group_id).unwrap().messages().len(), 2);

    let third = engine.classify(&capture, &EchoOcr).await;
    assert!(third.changed && third.created);

    // No frame: stay on the current slide.
    let fourth = engine.classify(&capture, &EchoOcr).await;
    assert_eq!(fourth.group_id, third.group_id);
    assert!(!fourth.changed);

    let fifth = engine.classify(&capture, &EchoOcr).await;
    assert_eq!(fifth.group_id, first.group_id);
    assert!(fifth.changed);
    assert_eq!(engine.groups().len(), 2);
    assert_eq!(engine.context_messages(true).len(), 2);
}

#[tokio::test]
async fn no_frame_before_any_slide_still_yields_a_group() {
    let capture = ScriptedCapture::new(vec![None]);
    let mut engine = SlideGroupEngine::new(SlidesConfig::default());
    let c = engine.classify(&capture, &EchoOcr).await;
    assert!(c.created);
    assert_eq!(engine.current_group().unwrap().id(), c.group_id);
}

#[tokio::test]
async fn ocr_failure_falls_back_to_an_empty_group() {
    let capture = ScriptedCapture::new(vec![Some("anything")]);
    let mut engine = SlideGroupEngine::new(SlidesConfig::default());
    let c = engine.classify(&capture, &BrokenOcr).await;
    assert!(c.created);
    assert_eq!(engine.groups().len(), 1);
    assert_eq!(engine.current_group().unwrap().id(), c.group_id);
    assert_eq!(engine.current_group().unwrap().fingerprint_text(), "");
}

#[tokio::test]
async fn ocr_failure_keeps_the_current_slide() {
    let capture = ScriptedCapture::new(vec![Some("krebs cycle citric acid"), Some("anything")]);
    let mut engine = SlideGroupEngine::new(SlidesConfig::default());
    let first = engine.classify(&capture, &EchoOcr).await;
    let second = engine.classify(&capture, &BrokenOcr).await;
    assert_eq!(second.group_id, first.group_id);
    assert!(!second.changed && !second.created);
    assert_eq!(engine.groups().len(), 1);
}
