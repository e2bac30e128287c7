//! Language model integration for the call screening assistant
//!
//! Features:
//! - Multiple backend support (OpenAI-compatible, Anthropic, Ollama)
//! - Retry with exponential backoff on transient failures
//! - Persona and summary instructions built from the caller profile
//! - Adapter to the core `LanguageModel` trait with a per-call timeout

pub mod adapter;
pub mod backend;
pub mod claude;
pub mod factory;
pub mod prompt;

pub use adapter::LanguageModelAdapter;
pub use backend::{GenerationResult, LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend};
pub use claude::ClaudeBackend;
pub use factory::LlmFactory;
pub use prompt::{
    build_summary_instructions, build_system_instructions, render_transcript, PromptBuilder,
};

use std::time::Duration;

use call_screen_core::DialogueError;
use thiserror::Error;

/// LLM errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Convert a transport failure, recognising client-side timeouts
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(timeout)
        } else {
            LlmError::Network(err.to_string())
        }
    }

    /// Network errors and timeouts are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::Timeout(_))
    }
}

impl From<LlmError> for DialogueError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Api(msg) => DialogueError::Api(msg),
            LlmError::Network(msg) => DialogueError::Unavailable(msg),
            LlmError::Configuration(msg) => DialogueError::Unavailable(msg),
            LlmError::InvalidResponse(msg) => DialogueError::InvalidResponse(msg),
            LlmError::EmptyResponse => DialogueError::EmptyResponse,
            LlmError::Timeout(d) => DialogueError::Timeout(d),
        }
    }
}
