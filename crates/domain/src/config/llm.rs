use serde::{Deserialize, Serialize};

use crate::tier::ModelTier;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the generation API (`{base}/models/{model}:generateContent`).
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Base URL of the resumable upload API (`{upload_base}/files`).
    #[serde(default = "d_upload_base_url")]
    pub upload_base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Model identifier per cascade tier.
    #[serde(default)]
    pub tiers: TierModels,
    /// Wall-clock bound on one generation attempt.
    #[serde(default = "d_120000")]
    pub generate_timeout_ms: u64,
    /// Wall-clock bound on the upload initiation call.
    #[serde(default = "d_30000")]
    pub upload_init_timeout_ms: u64,
    /// Wall-clock bound on the upload finalize call (carries the bytes).
    #[serde(default = "d_60000")]
    pub upload_finalize_timeout_ms: u64,
    /// Delay between file-state polls after an upload.
    #[serde(default = "d_2000")]
    pub file_poll_interval_ms: u64,
    /// Maximum number of file-state polls before giving up.
    #[serde(default = "d_30")]
    pub file_poll_max_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            upload_base_url: d_upload_base_url(),
            auth: AuthConfig::default(),
            tiers: TierModels::default(),
            generate_timeout_ms: d_120000(),
            upload_init_timeout_ms: d_30000(),
            upload_finalize_timeout_ms: d_60000(),
            file_poll_interval_ms: d_2000(),
            file_poll_max_attempts: d_30(),
        }
    }
}

/// Model identifiers for each cascade tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierModels {
    #[serde(default = "d_primary")]
    pub primary: String,
    #[serde(default = "d_secondary")]
    pub secondary: String,
    #[serde(default = "d_tertiary")]
    pub tertiary: String,
}

impl TierModels {
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Primary => &self.primary,
            ModelTier::Secondary => &self.secondary,
            ModelTier::Tertiary => &self.tertiary,
        }
    }
}

impl Default for TierModels {
    fn default() -> Self {
        Self {
            primary: d_primary(),
            secondary: d_secondary(),
            tertiary: d_tertiary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Env var containing the key.
    #[serde(default = "d_key_env")]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env).
    #[serde(default)]
    pub key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            env: d_key_env(),
            key: None,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn d_upload_base_url() -> String {
    "https://generativelanguage.googleapis.com/upload/v1beta".into()
}
fn d_primary() -> String {
    "gemini-2.5-pro".into()
}
fn d_secondary() -> String {
    "gemini-2.5-flash".into()
}
fn d_tertiary() -> String {
    "gemini-2.5-flash-lite".into()
}
fn d_key_env() -> Option<String> {
    Some("GEMINI_API_KEY".into())
}
fn d_120000() -> u64 {
    120_000
}
fn d_60000() -> u64 {
    60_000
}
fn d_30000() -> u64 {
    30_000
}
fn d_2000() -> u64 {
    2_000
}
fn d_30() -> u32 {
    30
}
