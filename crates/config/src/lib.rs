//! Layered configuration for the voice gateway.
//!
//! Loads from, in ascending priority: built-in defaults, `config/default.*`,
//! `config/{env}.*`, then `VOICE_AGENT__`-prefixed environment variables.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, AgentConfig, AuthConfig, LlmConfig, ObservabilityConfig, PersistenceConfig,
    RagConfig, RateLimitConfig, RuntimeEnvironment, ServerConfig, Settings, SessionConfig,
    SttConfig, TtsConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
