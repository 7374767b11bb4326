//! Engine configuration
//!
//! Loaded from TOML, then overridden by environment variables.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`AION_DEFAULT_PROVIDER`, `AION_RUN_TIMEOUT_MS`,
//!    `AION_MODEL_CONCURRENCY`)
//! 2. Config file passed to `EngineConfig::load`
//! 3. Defaults
//!
//! ```toml
//! default_provider = "simulate"
//! run_timeout_ms = 30000
//! model_concurrency = 8
//! tracing_sink = true
//!
//! [summary]
//! max_fields = 16
//! max_preview_chars = 256
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AionError, Result};

/// Engine-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Provider used by `model_call` tasks that do not name one
    pub default_provider: String,

    /// Run-level timeout, checked before each stage (no limit when unset)
    pub run_timeout_ms: Option<u64>,

    /// Default max in-flight provider calls per `model_call` task
    pub model_concurrency: usize,

    /// Bounds for input/output summaries in the execution log
    pub summary: SummaryLimits,

    /// Forward execution log entries to `tracing`
    pub tracing_sink: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_provider: "simulate".to_string(),
            run_timeout_ms: None,
            model_concurrency: 4,
            summary: SummaryLimits::default(),
            tracing_sink: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SummaryLimits {
    pub max_fields: usize,
    pub max_preview_chars: usize,
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self {
            max_fields: 16,
            max_preview_chars: 256,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| AionError::Config {
            reason: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// Returns defaults if the file doesn't exist.
    /// Returns error if the file exists but is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| AionError::Config {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AionError::Config {
            reason: format!("Failed to serialize config: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over file values.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    /// Same as `with_env`, with an explicit variable source
    pub fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(provider) = var("AION_DEFAULT_PROVIDER").filter(|v| !v.is_empty()) {
            self.default_provider = provider;
        }

        if let Some(raw) = var("AION_RUN_TIMEOUT_MS").filter(|v| !v.is_empty()) {
            let ms = raw.trim().parse::<u64>().map_err(|e| AionError::Config {
                reason: format!("AION_RUN_TIMEOUT_MS='{}': {}", raw, e),
            })?;
            self.run_timeout_ms = Some(ms);
        }

        if let Some(raw) = var("AION_MODEL_CONCURRENCY").filter(|v| !v.is_empty()) {
            self.model_concurrency = raw.trim().parse::<usize>().map_err(|e| AionError::Config {
                reason: format!("AION_MODEL_CONCURRENCY='{}': {}", raw, e),
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn with_default_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = provider.into();
        self
    }

    pub fn with_run_timeout_ms(mut self, ms: u64) -> Self {
        self.run_timeout_ms = Some(ms);
        self
    }

    pub fn with_model_concurrency(mut self, concurrency: usize) -> Self {
        self.model_concurrency = concurrency;
        self
    }

    pub fn without_tracing_sink(mut self) -> Self {
        self.tracing_sink = false;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.default_provider.trim().is_empty() {
            return Err(AionError::Config {
                reason: "default_provider cannot be empty".to_string(),
            });
        }
        if self.model_concurrency == 0 {
            return Err(AionError::Config {
                reason: "model_concurrency must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
