//! Configuration management for the call screening assistant
//!
//! Supports loading configuration from:
//! - YAML files (`config/default.yaml`, then `config/{env}.yaml`)
//! - Environment variables (`CALL_SCREEN_` prefix, `__` section separator)
//! - Provider API key variables (`OPENAI_API_KEY`, `DEEPGRAM_API_KEY`, ...)

pub mod constants;
pub mod providers;
pub mod settings;

pub use providers::{LlmProvider, LlmSettings, SttSettings, TtsSettings};
pub use settings::{
    load_settings, load_settings_from, HandoffKind, HandoffSettings, ObservabilityConfig,
    OrchestratorSettings, RuntimeEnvironment, ServerConfig, Settings, SummarySettings,
    SummaryStrategyKind,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
