//! Google Gemini transport.
//!
//! Implements `generateContent` and the resumable Files API upload.
//! Auth is via an API key passed as a query parameter (`key={api_key}`).

use crate::traits::{ModelTransport, RawResponse, UploadRequest, UploadedFile};
use crate::util::{from_reqwest, redact_url_key, resolve_api_key};
use lq_domain::config::LlmConfig;
use lq_domain::content::{GenerationPayload, GenerationRequest, Part, Role, Turn};
use lq_domain::error::{Error, Result};
use lq_domain::trace::TraceEvent;
use serde_json::Value;
use std::time::{Duration, Instant};

const STATE_ACTIVE: &str = "ACTIVE";
const STATE_FAILED: &str = "FAILED";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A [`ModelTransport`] speaking the Gemini REST API.
pub struct GeminiTransport {
    id: String,
    base_url: String,
    upload_base_url: String,
    api_key: String,
    client: reqwest::Client,
    generate_timeout: Duration,
    upload_init_timeout: Duration,
    upload_finalize_timeout: Duration,
    poll_interval: Duration,
    poll_max_attempts: u32,
}

impl GeminiTransport {
    /// Create a transport from the `[llm]` config, resolving the API key.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        Self::with_api_key(cfg, api_key)
    }

    pub fn with_api_key(cfg: &LlmConfig, api_key: String) -> Result<Self> {
        // Timeouts are set per request; the generation and upload phases
        // each have their own bound.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "gemini".into(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            upload_base_url: cfg.upload_base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            generate_timeout: Duration::from_millis(cfg.generate_timeout_ms),
            upload_init_timeout: Duration::from_millis(cfg.upload_init_timeout_ms),
            upload_finalize_timeout: Duration::from_millis(cfg.upload_finalize_timeout_ms),
            poll_interval: Duration::from_millis(cfg.file_poll_interval_ms),
            poll_max_attempts: cfg.file_poll_max_attempts,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    fn upload_init_url(&self) -> String {
        format!("{}/files?key={}", self.upload_base_url, self.api_key)
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/{}?key={}", self.base_url, name, self.api_key)
    }

    /// Phase one: announce the upload and obtain the session URL.
    async fn initiate_upload(&self, req: &UploadRequest) -> Result<String> {
        let url = self.upload_init_url();
        tracing::debug!(url = %redact_url_key(&url), name = %req.display_name, "gemini upload initiate");

        let resp = self
            .client
            .post(&url)
            .timeout(self.upload_init_timeout)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header(
                "X-Goog-Upload-Header-Content-Length",
                req.bytes.len().to_string(),
            )
            .header("X-Goog-Upload-Header-Content-Type", req.mime_type.as_str())
            .json(&serde_json::json!({
                "file": { "display_name": req.display_name }
            }))
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Upload(format!(
                "initiate failed: HTTP {} - {}",
                status.as_u16(),
                text
            )));
        }

        resp.headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Upload("initiate response has no X-Goog-Upload-URL".into()))
    }

    /// Phase two: send the bytes and finalize in one request.
    async fn finalize_upload(&self, session_url: &str, req: UploadRequest) -> Result<UploadedFile> {
        let len = req.bytes.len();
        let resp = self
            .client
            .post(session_url)
            .timeout(self.upload_finalize_timeout)
            .header("Content-Length", len.to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(req.bytes)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::Upload(format!(
                "finalize failed: HTTP {} - {}",
                status.as_u16(),
                text
            )));
        }

        let v: Value = serde_json::from_str(&text)?;
        parse_file_meta(&v, &req.mime_type)
            .ok_or_else(|| Error::Upload("finalize response has no file.uri".into()))
    }

    /// Poll file metadata until the service reports it `ACTIVE`.
    async fn wait_until_active(&self, mut file: UploadedFile) -> Result<UploadedFile> {
        let mut polls = 0;
        while file.state != STATE_ACTIVE {
            if file.state == STATE_FAILED {
                return Err(Error::Upload(format!("file {} failed processing", file.name)));
            }
            if polls >= self.poll_max_attempts {
                return Err(Error::Upload(format!(
                    "file {} still {} after {} polls",
                    file.name, file.state, polls
                )));
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;

            let url = self.file_url(&file.name);
            tracing::debug!(url = %redact_url_key(&url), poll = polls, "gemini file state poll");
            let resp = self
                .client
                .get(&url)
                .timeout(self.upload_init_timeout)
                .send()
                .await
                .map_err(from_reqwest)?;
            let status = resp.status();
            let text = resp.text().await.map_err(from_reqwest)?;
            if !status.is_success() {
                return Err(Error::Upload(format!(
                    "file state poll failed: HTTP {} - {}",
                    status.as_u16(),
                    text
                )));
            }
            let v: Value = serde_json::from_str(&text)?;
            if let Some(updated) = parse_file_meta(&v, &file.mime_type) {
                file = updated;
            }
        }
        Ok(file)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn build_body(payload: &GenerationPayload) -> Value {
    let contents: Vec<Value> = payload.contents.iter().map(turn_to_gemini).collect();

    let mut body = serde_json::json!({
        "contents": contents,
    });

    if let Some(si) = &payload.system_instruction {
        body["systemInstruction"] = serde_json::json!({
            "parts": [{"text": si}]
        });
    }

    let mut gen_config = serde_json::json!({});
    if let Some(temp) = payload.temperature {
        gen_config["temperature"] = serde_json::json!(temp);
    }
    if payload.json_mode {
        gen_config["responseMimeType"] = serde_json::json!("application/json");
    }
    if gen_config.as_object().is_some_and(|o| !o.is_empty()) {
        body["generationConfig"] = gen_config;
    }

    body
}

fn turn_to_gemini(turn: &Turn) -> Value {
    let role = match turn.role {
        Role::User => "user",
        Role::Model => "model",
    };
    let parts: Vec<Value> = turn.parts.iter().map(part_to_gemini).collect();
    serde_json::json!({
        "role": role,
        "parts": parts,
    })
}

fn part_to_gemini(part: &Part) -> Value {
    match part {
        Part::Text(text) => serde_json::json!({"text": text}),
        Part::InlineData { mime_type, data } => serde_json::json!({
            "inlineData": {
                "mimeType": mime_type,
                "data": data,
            }
        }),
        Part::FileData {
            mime_type,
            file_uri,
        } => serde_json::json!({
            "fileData": {
                "mimeType": mime_type,
                "fileUri": file_uri,
            }
        }),
    }
}

/// Read `{file: {...}}` or a bare file resource.
fn parse_file_meta(v: &Value, fallback_mime: &str) -> Option<UploadedFile> {
    let file = v.get("file").unwrap_or(v);
    let uri = file.get("uri")?.as_str()?.to_string();
    let name = file
        .get("name")
        .and_then(|n| n.as_str())
        .unwrap_or_default()
        .to_string();
    let mime_type = file
        .get("mimeType")
        .and_then(|m| m.as_str())
        .unwrap_or(fallback_mime)
        .to_string();
    // Small files skip processing and come back without a state.
    let state = file
        .get("state")
        .and_then(|s| s.as_str())
        .unwrap_or(STATE_ACTIVE)
        .to_string();
    Some(UploadedFile {
        name,
        uri,
        mime_type,
        state,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ModelTransport for GeminiTransport {
    async fn generate(&self, req: &GenerationRequest) -> Result<RawResponse> {
        let url = self.generate_url(&req.model);
        let body = build_body(&req.payload);

        tracing::debug!(transport = %self.id, url = %redact_url_key(&url), "gemini generate request");

        let resp = self
            .client
            .post(&url)
            .timeout(self.generate_timeout)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(from_reqwest)?;
        Ok(RawResponse::new(status, text))
    }

    async fn upload(&self, req: UploadRequest) -> Result<UploadedFile> {
        let started = Instant::now();
        let display_name = req.display_name.clone();
        let bytes = req.bytes.len();

        let session_url = self.initiate_upload(&req).await?;
        let file = self.finalize_upload(&session_url, req).await?;
        let file = self.wait_until_active(file).await?;

        TraceEvent::FileUploaded {
            display_name,
            bytes,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
        Ok(file)
    }

    fn transport_id(&self) -> &str {
        &self.id
    }
}
