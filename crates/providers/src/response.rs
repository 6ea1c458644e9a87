//! Decoding of `generateContent` response bodies.
//!
//! Success bodies carry `candidates[0].content.parts[].text`; failures carry
//! an `error` envelope (`{code, status, message, details}`), sometimes even
//! on a 200.

use lq_domain::error::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// "Please retry in 37.2s." style advisories inside error messages.
static RETRY_IN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)retry in\s+([0-9]+(?:\.[0-9]+)?)\s*s").ok());

const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorEnvelope {
    pub code: Option<u16>,
    pub status: Option<String>,
    pub message: String,
    /// `retryDelay` from a `RetryInfo` detail, in seconds.
    pub retry_delay_secs: Option<f64>,
}

impl ErrorEnvelope {
    /// Extract the `error` object from a response body, if there is one.
    pub fn parse(body: &str) -> Option<Self> {
        let v: Value = serde_json::from_str(body).ok()?;
        let err = v.get("error")?;
        if !err.is_object() {
            return None;
        }

        let code = err
            .get("code")
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok());
        let status = err
            .get("status")
            .and_then(|s| s.as_str())
            .map(str::to_string);
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        let retry_delay_secs = err
            .get("details")
            .and_then(|d| d.as_array())
            .and_then(|details| {
                details.iter().find_map(|d| {
                    d.get("retryDelay")
                        .and_then(|r| r.as_str())
                        .and_then(parse_duration_secs)
                })
            });

        Some(Self {
            code,
            status,
            message,
            retry_delay_secs,
        })
    }

    pub fn is_resource_exhausted(&self) -> bool {
        self.status.as_deref() == Some(RESOURCE_EXHAUSTED) || self.code == Some(429)
    }
}

/// Parse a protobuf-JSON duration such as `"37s"` or `"1.5s"`.
fn parse_duration_secs(s: &str) -> Option<f64> {
    s.trim().strip_suffix('s')?.trim().parse::<f64>().ok()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Advisory wait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute how long to wait after a rate-limit response.
///
/// The "retry in N s" message pattern wins over a structured `retryDelay`;
/// with neither, `default_secs` is used. Fractions round up and the result
/// is never below `floor_secs`.
pub fn retry_after_secs(
    message: &str,
    retry_delay_secs: Option<f64>,
    default_secs: u64,
    floor_secs: u64,
) -> u64 {
    let from_message = RETRY_IN
        .as_ref()
        .and_then(|re| re.captures(message))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    let secs = match from_message.or(retry_delay_secs) {
        Some(s) if s.is_finite() && s >= 0.0 => s.ceil() as u64,
        _ => default_secs,
    };
    secs.max(floor_secs)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Candidate text
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Concatenate the text parts of the first candidate.
pub fn candidate_text(body: &str) -> Result<String> {
    let v: Value = serde_json::from_str(body)?;
    let candidate = v
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: "gemini".into(),
            message: "no candidates in response".into(),
        })?;

    let mut text = String::new();
    if let Some(parts) = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    {
        for part in parts {
            if let Some(t) = part.get("text").and_then(|v| v.as_str()) {
                text.push_str(t);
            }
        }
    }

    if text.is_empty() {
        let reason = candidate
            .get("finishReason")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        return Err(Error::Provider {
            provider: "gemini".into(),
            message: format!("candidate has no text (finishReason: {reason})"),
        });
    }
    Ok(text)
}
