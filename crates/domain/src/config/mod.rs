mod jobs;
mod llm;
mod observability;
mod slides;

pub use jobs::*;
pub use llm::*;
pub use observability::*;
pub use slides::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub slides: SlidesConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing keys.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Load from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut error = |field: &str, message: &str| {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: field.into(),
                message: message.into(),
            })
        };

        if self.llm.base_url.is_empty() {
            error("llm.base_url", "base_url must not be empty");
        }
        if self.llm.upload_base_url.is_empty() {
            error("llm.upload_base_url", "upload_base_url must not be empty");
        }
        for (field, model) in [
            ("llm.tiers.primary", &self.llm.tiers.primary),
            ("llm.tiers.secondary", &self.llm.tiers.secondary),
            ("llm.tiers.tertiary", &self.llm.tiers.tertiary),
        ] {
            if model.trim().is_empty() {
                error(field, "tier model id must not be empty");
            }
        }
        if self.llm.generate_timeout_ms == 0 {
            error("llm.generate_timeout_ms", "timeout must be greater than 0");
        }
        if !(0.0..=100.0).contains(&self.slides.similarity_threshold) {
            error(
                "slides.similarity_threshold",
                "threshold is a percentage and must be within 0..=100",
            );
        }
        if self.jobs.min_rate_limit_wait_secs == 0 {
            error(
                "jobs.min_rate_limit_wait_secs",
                "rate-limit wait floor must be at least 1 second",
            );
        }

        if self.llm.auth.key.is_none() && self.llm.auth.env.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.auth".into(),
                message: "no API key source configured".into(),
            });
        }
        if self.jobs.transport_retry_limit().is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "jobs.max_transport_retries".into(),
                message: "transport failures are retried without bound".into(),
            });
        }
        if self.slides.scoped_context_messages == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "slides.scoped_context_messages".into(),
                message: "slide-scoped chat requests will carry no history".into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
