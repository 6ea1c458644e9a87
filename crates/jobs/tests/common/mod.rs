//! Scripted in-memory transport shared by the job tests. No network access.

#![allow(dead_code)]

use lq_domain::content::GenerationRequest;
use lq_domain::error::{Error, Result};
use lq_providers::{ModelTransport, RawResponse, UploadRequest, UploadedFile};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub enum Step {
    Reply(u16, String),
    Fail(String),
    /// Sleep, then play the inner step.
    Delay(Duration, Box<Step>),
}

pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn models(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.model.clone()).collect()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().len()
    }
}

#[async_trait::async_trait]
impl ModelTransport for ScriptedTransport {
    async fn generate(&self, req: &GenerationRequest) -> Result<RawResponse> {
        self.requests.lock().push(req.clone());
        let mut step = self.steps.lock().pop_front();
        loop {
            match step {
                Some(Step::Reply(status, body)) => return Ok(RawResponse::new(status, body)),
                Some(Step::Fail(msg)) => return Err(Error::Http(msg)),
                Some(Step::Delay(d, inner)) => {
                    tokio::time::sleep(d).await;
                    step = Some(*inner);
                }
                None => return Err(Error::Other("script exhausted".into())),
            }
        }
    }

    async fn upload(&self, req: UploadRequest) -> Result<UploadedFile> {
        Ok(UploadedFile {
            name: "files/scripted".into(),
            uri: format!("https://files.test/{}", req.display_name),
            mime_type: req.mime_type,
            state: "ACTIVE".into(),
        })
    }

    fn transport_id(&self) -> &str {
        "scripted"
    }
}

pub fn ok(text: &str) -> Step {
    let body = serde_json::json!({
        "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
    });
    Step::Reply(200, body.to_string())
}

pub fn exhausted(message: &str) -> Step {
    let body = serde_json::json!({
        "error": {"code": 429, "status": "RESOURCE_EXHAUSTED", "message": message}
    });
    Step::Reply(429, body.to_string())
}

pub fn server_error() -> Step {
    let body = serde_json::json!({
        "error": {"code": 500, "status": "INTERNAL", "message": "backend error"}
    });
    Step::Reply(500, body.to_string())
}

pub fn delayed(secs: u64, step: Step) -> Step {
    Step::Delay(Duration::from_secs(secs), Box::new(step))
}

pub const FLASHCARDS: &str = r#"[{"front": "ATP", "back": "energy currency"}, {"front": "DNA", "back": "genome"}]"#;
