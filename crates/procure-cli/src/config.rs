//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use procure_agent::RetryConfig;

/// Configuration for procuregraph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model to use
    pub model: Option<String>,
    /// Responses API endpoint
    pub base_url: Option<String>,
    /// API key (alternative to OPENAI_API_KEY)
    pub api_key: Option<String>,
    /// Vector store searched during investigations
    pub knowledge_base_id: Option<String>,
    /// Deadline for a single LLM call, in seconds
    pub call_timeout_secs: Option<u64>,
    /// Output token ceiling per call
    pub max_output_tokens: Option<u32>,
    /// Backoff for transient provider failures
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Retry configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
}

impl RetrySettings {
    /// Fill unset fields from the defaults
    pub fn to_retry_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            initial_delay: self
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            max_delay: self
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            backoff_multiplier: self
                .backoff_multiplier
                .filter(|m| m.is_finite() && *m >= 1.0)
                .unwrap_or(defaults.backoff_multiplier),
        }
    }
}

/// Environment variables that override the file
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_KNOWLEDGE_BASE: &str = "OPENAI_PROCUREMENT_VECTOR_STORE_ID";

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("procuregraph")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for PROCUREGRAPH_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("PROCUREGRAPH_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location, then apply environment overrides
    pub fn load() -> Self {
        let mut config = Self::load_from(&Self::config_path());
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load config from a file; a missing or unreadable file gives the defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Overlay non-empty environment values
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = Some(model);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = Some(url);
        }
        if let Some(id) = get(ENV_KNOWLEDGE_BASE) {
            self.knowledge_base_id = Some(id);
        }
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        Self::init_at(&path)?;
        Ok(path)
    }

    pub fn init_at(path: &Path) -> std::io::Result<()> {
        if path.exists() {
            return Ok(());
        }

        let default_config = Config {
            model: Some(procure_ai::models::DEFAULT_MODEL_ID.to_string()),
            base_url: Some(procure_ai::models::DEFAULT_BASE_URL.to_string()),
            call_timeout_secs: Some(procure_agent::gateway::DEFAULT_CALL_TIMEOUT.as_secs()),
            ..Default::default()
        };

        default_config.save_to(path)
    }

    pub fn model_id(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or(procure_ai::models::DEFAULT_MODEL_ID)
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(procure_ai::models::DEFAULT_BASE_URL)
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(procure_agent::gateway::DEFAULT_CALL_TIMEOUT)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# procuregraph configuration file
# Place at ~/.config/procuregraph/config.toml (Linux) or set PROCUREGRAPH_CONFIG_PATH

# Default model to use (OPENAI_MODEL overrides)
model = "gpt-4.1-mini"

# Responses API endpoint (OPENAI_BASE_URL overrides)
base_url = "https://api.openai.com/v1"

# Vector store searched during investigations (OPENAI_PROCUREMENT_VECTOR_STORE_ID overrides)
# knowledge_base_id = "vs_..."

# Deadline for a single LLM call, in seconds
call_timeout_secs = 120

# Output token ceiling per call (optional)
# max_output_tokens = 4096

# API key (optional - OPENAI_API_KEY is preferred)
# api_key = "sk-..."

[retry]
# max_retries = 3
# initial_delay_ms = 1000
# max_delay_ms = 60000
# backoff_multiplier = 2.0
"#
}
