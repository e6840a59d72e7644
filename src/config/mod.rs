//! Configuration management for the smart-home voice server
//!
//! Configuration is layered: struct defaults, then an optional TOML file, then
//! `SMARTHOME__SECTION__KEY` environment variables. `OPENAI_API_KEY` is honoured
//! as a fallback for the API key.

use crate::error::{HomeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable prefix for layered configuration
pub const ENV_PREFIX: &str = "SMARTHOME";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listener configuration
    pub http: HttpConfig,

    /// OpenAI API configuration
    pub openai: OpenAiConfig,

    /// Conversation orchestrator configuration
    pub assistant: AssistantConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Externally reachable base URL, used to build webhook URLs
    pub public_url: Url,

    /// Enable permissive CORS
    pub enable_cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            public_url: Url::parse("http://localhost:3001/").expect("static URL is valid"),
            enable_cors: false,
        }
    }
}

/// OpenAI API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key; never serialized back out
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL (must end with a slash so relative joins keep `/v1`)
    pub base_url: Url,

    /// Model used for realtime ephemeral sessions
    pub realtime_model: String,

    /// Voice used by the realtime session
    pub realtime_voice: String,

    /// Model used by the turn-based chat loop
    pub chat_model: String,

    /// Model used for audio transcription
    pub transcription_model: String,

    /// Model used for speech synthesis
    pub speech_model: String,

    /// Voice used for speech synthesis
    pub speech_voice: String,

    /// Request timeout for every upstream call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Url::parse("https://api.openai.com/v1/").expect("static URL is valid"),
            realtime_model: "gpt-realtime-mini-2025-10-06".to_string(),
            realtime_voice: "verse".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            transcription_model: "whisper-1".to_string(),
            speech_model: "tts-1".to_string(),
            speech_voice: "nova".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl OpenAiConfig {
    /// Return the configured API key, or a configuration error when missing
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(HomeError::config("OpenAI API key is not configured.")),
        }
    }

    /// Build an endpoint URL relative to the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| HomeError::config(format!("Invalid OpenAI endpoint '{path}': {e}")))
    }
}

/// Which devices the tool dispatcher may see
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// Only the calling user's visible devices
    #[default]
    Owner,
    /// Every visible device, regardless of owner
    Global,
}

/// Conversation orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Maximum number of tool-call rounds before a final answer is forced
    pub max_tool_rounds: usize,

    /// Device visibility for tool dispatch
    pub scope: ScopeMode,

    /// Synthesize speech for final answers
    pub speech_enabled: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 3,
            scope: ScopeMode::Owner,
            speech_enabled: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is unset
    pub level: String,

    /// Optional log file (rotated daily)
    pub file: Option<PathBuf>,

    /// Emit JSON formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: ServerConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| HomeError::config(format!("Failed to load configuration: {e}")))?;

        if config.openai.api_key.is_none() {
            config.openai.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values that serde cannot check
    pub fn validate(&self) -> Result<()> {
        if self.http.port == 0 {
            return Err(HomeError::config("http.port must be non-zero"));
        }

        if self.assistant.max_tool_rounds == 0 {
            return Err(HomeError::config(
                "assistant.max_tool_rounds must be at least 1",
            ));
        }

        match self.openai.base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(HomeError::config(format!(
                    "openai.base_url must use http or https, got '{other}'"
                )))
            }
        }

        if !self.openai.base_url.path().ends_with('/') {
            return Err(HomeError::config("openai.base_url must end with '/'"));
        }

        Ok(())
    }

    /// Configuration for development and tests, pointing at a given API base
    pub fn dev_mode(base_url: Url, api_key: &str) -> Self {
        let mut config = Self::default();
        config.openai.base_url = base_url;
        config.openai.api_key = Some(api_key.to_string());
        config.openai.timeout = Duration::from_secs(5);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.assistant.max_tool_rounds, 3);
        assert_eq!(config.openai.realtime_model, "gpt-realtime-mini-2025-10-06");
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let mut config = OpenAiConfig::default();
        assert!(matches!(config.require_api_key(), Err(HomeError::Config(_))));

        config.api_key = Some("   ".to_string());
        let err = config.require_api_key().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: OpenAI API key is not configured."
        );

        config.api_key = Some("sk-test".to_string());
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn test_endpoint_keeps_version_prefix() {
        let config = OpenAiConfig::default();
        assert_eq!(
            config.endpoint("realtime/sessions").unwrap().as_str(),
            "https://api.openai.com/v1/realtime/sessions"
        );
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let mut config = ServerConfig::default();
        config.assistant.max_tool_rounds = 0;
        assert!(config.validate().is_err());
    }
}
