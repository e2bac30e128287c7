//! LLM Factory
//!
//! Creates a `LanguageModel` from settings:
//! - **openai**: OpenAI chat completions (or a compatible gateway via `endpoint`)
//! - **anthropic**: Anthropic Messages API
//! - **ollama**: local models through Ollama
//!
//! ```ignore
//! let llm = LlmFactory::create(&settings.llm)?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use call_screen_config::{LlmProvider, LlmSettings};
use call_screen_core::LanguageModel;

use crate::adapter::LanguageModelAdapter;
use crate::backend::{LlmConfig, OllamaBackend, OpenAIBackend};
use crate::claude::ClaudeBackend;
use crate::LlmError;

pub struct LlmFactory;

impl LlmFactory {
    /// Backend configuration derived from settings
    pub fn backend_config(settings: &LlmSettings) -> LlmConfig {
        LlmConfig {
            model: settings.resolved_model(),
            endpoint: settings.resolved_endpoint(),
            api_key: settings.resolved_api_key(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout: Duration::from_millis(settings.timeout_ms),
            max_retries: settings.max_retries,
            ..LlmConfig::default()
        }
    }

    /// Create a language model for the configured provider
    ///
    /// The adapter's overall timeout covers every retry attempt, so it is
    /// the per-attempt timeout times the attempt count.
    pub fn create(settings: &LlmSettings) -> Result<Arc<dyn LanguageModel>, LlmError> {
        let config = Self::backend_config(settings);
        let overall = config.timeout * (config.max_retries + 1);

        tracing::info!(
            provider = ?settings.provider,
            model = %config.model,
            endpoint = %config.endpoint,
            "Creating language model"
        );

        let adapter = match settings.provider {
            LlmProvider::OpenAi => LanguageModelAdapter::new(OpenAIBackend::new(config)?),
            LlmProvider::Anthropic => LanguageModelAdapter::new(ClaudeBackend::new(config)?),
            LlmProvider::Ollama => LanguageModelAdapter::new(OllamaBackend::new(config)?),
        };

        Ok(Arc::new(adapter.with_timeout(overall)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_config_from_settings() {
        let settings = LlmSettings {
            provider: LlmProvider::Ollama,
            model: "mistral".to_string(),
            timeout_ms: 1500,
            max_retries: 1,
            ..Default::default()
        };

        let config = LlmFactory::backend_config(&settings);
        assert_eq!(config.model, "mistral");
        assert_eq!(config.endpoint, "http://localhost:11434");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn test_create_ollama_needs_no_key() {
        let settings = LlmSettings {
            provider: LlmProvider::Ollama,
            ..Default::default()
        };
        let llm = LlmFactory::create(&settings).unwrap();
        assert_eq!(llm.model_name(), "llama3.2");
    }

    #[test]
    fn test_create_openai_with_key() {
        let settings = LlmSettings {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let llm = LlmFactory::create(&settings).unwrap();
        assert_eq!(llm.model_name(), "gpt-4-turbo");
    }
}
