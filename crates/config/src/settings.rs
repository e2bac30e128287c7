//! Main settings module

use std::path::Path;

use call_screen_core::Profile;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::timeouts;
use crate::{ConfigError, LlmSettings, SttSettings, TtsSettings};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub stt: SttSettings,

    #[serde(default)]
    pub tts: TtsSettings,

    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    #[serde(default)]
    pub summary: SummarySettings,

    #[serde(default)]
    pub handoff: HandoffSettings,

    /// Persona used when a call is created without one
    #[serde(default)]
    pub profile: Profile,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.llm.validate()?;
        self.stt.validate()?;
        self.tts.validate()?;
        self.validate_orchestrator()?;
        self.validate_handoff()?;

        self.profile
            .validate()
            .map_err(|e| ConfigError::invalid("profile", e.to_string()))?;

        if self.environment.is_production() {
            if self.llm.resolved_api_key().is_none()
                && self.llm.provider != crate::LlmProvider::Ollama
            {
                return Err(ConfigError::MissingField("llm.api_key".to_string()));
            }
            if self.stt.resolved_api_key().is_none() {
                return Err(ConfigError::MissingField("stt.api_key".to_string()));
            }
            if self.tts.resolved_api_key().is_none() {
                return Err(ConfigError::MissingField("tts.api_key".to_string()));
            }
        }

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::invalid("server.port", "Port cannot be 0"));
        }

        if server.max_sessions == 0 {
            return Err(ConfigError::invalid(
                "server.max_sessions",
                "Max sessions must be at least 1",
            ));
        }

        if server.timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "server.timeout_seconds",
                "Timeout must be at least 1 second",
            ));
        }

        Ok(())
    }

    fn validate_orchestrator(&self) -> Result<(), ConfigError> {
        let orch = &self.orchestrator;

        if !(0.0..=1.0).contains(&orch.min_confidence) {
            return Err(ConfigError::invalid(
                "orchestrator.min_confidence",
                format!("Must be between 0.0 and 1.0, got {}", orch.min_confidence),
            ));
        }

        if orch.max_consecutive_apologies == 0 {
            return Err(ConfigError::invalid(
                "orchestrator.max_consecutive_apologies",
                "Must be at least 1",
            ));
        }

        if orch.max_call_duration_secs == 0 {
            return Err(ConfigError::invalid(
                "orchestrator.max_call_duration_secs",
                "Must be at least 1 second",
            ));
        }

        if orch.apology_text.trim().is_empty() {
            return Err(ConfigError::MissingField(
                "orchestrator.apology_text".to_string(),
            ));
        }

        if orch.transcription_retries > 5 {
            tracing::warn!(
                retries = orch.transcription_retries,
                "High transcription retry count will stall the caller on failures"
            );
        }

        Ok(())
    }

    fn validate_handoff(&self) -> Result<(), ConfigError> {
        if self.handoff.kind == HandoffKind::Webhook {
            match &self.handoff.webhook_url {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                Some(url) => {
                    return Err(ConfigError::invalid(
                        "handoff.webhook_url",
                        format!("Must be an http(s) URL, got {}", url),
                    ))
                }
                None => return Err(ConfigError::MissingField("handoff.webhook_url".to_string())),
            }
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrently active calls
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Ended calls kept for lookup after they leave the live set
    #[serde(default = "default_retained_calls")]
    pub retained_calls: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_sessions() -> usize {
    100
}
fn default_retained_calls() -> usize {
    100
}
fn default_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_sessions: default_max_sessions(),
            retained_calls: default_retained_calls(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Turn orchestration policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Extra transcription attempts per segment
    #[serde(default = "default_transcription_retries")]
    pub transcription_retries: u32,

    /// Initial backoff between transcription attempts, doubled each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Failed segments in a row before the call is ended
    #[serde(default = "default_max_consecutive_apologies")]
    pub max_consecutive_apologies: u32,

    /// Transcriptions below this confidence count as failures
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    #[serde(default = "default_max_call_duration")]
    pub max_call_duration_secs: u64,

    #[serde(default = "default_apology_text")]
    pub apology_text: String,

    #[serde(default = "default_notice_text")]
    pub notice_text: String,

    /// Capacity of the per-call event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_transcription_retries() -> u32 {
    1
}
fn default_retry_backoff_ms() -> u64 {
    200
}
fn default_max_consecutive_apologies() -> u32 {
    3
}
fn default_min_confidence() -> f32 {
    0.3
}
fn default_max_call_duration() -> u64 {
    1800
}
fn default_apology_text() -> String {
    "Sorry, I didn't catch that. Could you repeat?".to_string()
}
fn default_notice_text() -> String {
    "I'm sorry, I'm having technical difficulties. Please try calling back later. Goodbye."
        .to_string()
}
fn default_event_capacity() -> usize {
    64
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            transcription_retries: default_transcription_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_consecutive_apologies: default_max_consecutive_apologies(),
            min_confidence: default_min_confidence(),
            max_call_duration_secs: default_max_call_duration(),
            apology_text: default_apology_text(),
            notice_text: default_notice_text(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// How the call summary is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStrategyKind {
    /// Rule-based extraction only
    Extractive,
    /// Model extraction merged over the rule-based baseline
    #[default]
    Generative,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SummarySettings {
    #[serde(default)]
    pub strategy: SummaryStrategyKind,
}

/// Where finished summaries go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HandoffKind {
    #[default]
    Log,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffSettings {
    #[serde(default)]
    pub kind: HandoffKind,

    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_handoff_timeout")]
    pub timeout_ms: u64,
}

fn default_handoff_timeout() -> u64 {
    timeouts::HANDOFF_MS
}

impl Default for HandoffSettings {
    fn default() -> Self {
        Self {
            kind: HandoffKind::default(),
            webhook_url: None,
            timeout_ms: default_handoff_timeout(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Install the Prometheus recorder and expose `/metrics`
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/` and the environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from a config directory and the environment
///
/// Later sources override earlier ones: `default.*`, then `{env}.*`, then
/// `CALL_SCREEN__SECTION__FIELD` variables.
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = dir.join("default");
    builder = builder.add_source(File::with_name(&default_path.to_string_lossy()).required(false));

    if let Some(env_name) = env {
        let env_path = dir.join(env_name);
        builder =
            builder.add_source(File::with_name(&env_path.to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("CALL_SCREEN")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
