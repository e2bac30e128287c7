//! External capability settings: generation, transcription, synthesis

use serde::{Deserialize, Serialize};

use crate::constants::{api_key_vars, endpoints, models, timeouts};
use crate::ConfigError;

/// Generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Anthropic,
    Ollama,
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model identifier; provider default when empty
    #[serde(default)]
    pub model: String,

    /// Base URL override
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_ms: u64,

    /// Retries on network errors and timeouts inside the backend
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    200
}
fn default_llm_timeout() -> u64 {
    timeouts::LLM_MS
}
fn default_llm_retries() -> u32 {
    2
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: String::new(),
            endpoint: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_llm_timeout(),
            max_retries: default_llm_retries(),
        }
    }
}

impl LlmSettings {
    /// Configured model, or the provider's default
    pub fn resolved_model(&self) -> String {
        if !self.model.trim().is_empty() {
            return self.model.clone();
        }
        match self.provider {
            LlmProvider::OpenAi => models::OPENAI_CHAT,
            LlmProvider::Anthropic => models::ANTHROPIC_CHAT,
            LlmProvider::Ollama => models::OLLAMA_CHAT,
        }
        .to_string()
    }

    /// Configured endpoint, or the provider's default
    pub fn resolved_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint.clone(),
            _ => match self.provider {
                LlmProvider::OpenAi => endpoints::OPENAI,
                LlmProvider::Anthropic => endpoints::ANTHROPIC,
                LlmProvider::Ollama => endpoints::OLLAMA,
            }
            .to_string(),
        }
    }

    /// Key from config, falling back to the provider's environment variable
    pub fn resolved_api_key(&self) -> Option<String> {
        let var = match self.provider {
            LlmProvider::OpenAi => api_key_vars::OPENAI,
            LlmProvider::Anthropic => api_key_vars::ANTHROPIC,
            LlmProvider::Ollama => return self.api_key.clone(),
        };
        resolve_key(&self.api_key, var)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::invalid(
                "llm.temperature",
                format!("Must be between 0.0 and 2.0, got {}", self.temperature),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::invalid("llm.max_tokens", "Must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("llm.timeout_ms", "Timeout cannot be 0"));
        }
        Ok(())
    }
}

/// Speech-to-text settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttSettings {
    #[serde(default = "default_stt_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_stt_model")]
    pub model: String,

    /// BCP-47 language hint
    #[serde(default)]
    pub language: Option<String>,

    #[serde(default = "default_stt_timeout")]
    pub timeout_ms: u64,
}

fn default_stt_endpoint() -> String {
    endpoints::DEEPGRAM.to_string()
}
fn default_stt_model() -> String {
    models::DEEPGRAM_STT.to_string()
}
fn default_stt_timeout() -> u64 {
    timeouts::STT_MS
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            endpoint: default_stt_endpoint(),
            api_key: None,
            model: default_stt_model(),
            language: None,
            timeout_ms: default_stt_timeout(),
        }
    }
}

impl SttSettings {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(&self.api_key, api_key_vars::DEEPGRAM)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("stt.endpoint".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("stt.timeout_ms", "Timeout cannot be 0"));
        }
        Ok(())
    }
}

/// Text-to-speech settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsSettings {
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Voice used when the profile does not pick one
    #[serde(default = "default_voice_id")]
    pub default_voice_id: String,

    #[serde(default = "default_tts_model")]
    pub model_id: String,

    #[serde(default = "default_tts_timeout")]
    pub timeout_ms: u64,
}

fn default_tts_endpoint() -> String {
    endpoints::ELEVENLABS.to_string()
}
fn default_voice_id() -> String {
    models::ELEVENLABS_VOICE.to_string()
}
fn default_tts_model() -> String {
    models::ELEVENLABS_TTS.to_string()
}
fn default_tts_timeout() -> u64 {
    timeouts::TTS_MS
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            endpoint: default_tts_endpoint(),
            api_key: None,
            default_voice_id: default_voice_id(),
            model_id: default_tts_model(),
            timeout_ms: default_tts_timeout(),
        }
    }
}

impl TtsSettings {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(&self.api_key, api_key_vars::ELEVENLABS)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("tts.endpoint".to_string()));
        }
        if self.default_voice_id.trim().is_empty() {
            return Err(ConfigError::MissingField("tts.default_voice_id".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("tts.timeout_ms", "Timeout cannot be 0"));
        }
        Ok(())
    }
}

fn resolve_key(configured: &Option<String>, env_var: &str) -> Option<String> {
    configured
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.trim().is_empty()))
}
