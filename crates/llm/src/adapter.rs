//! Language Model adapter
//!
//! Bridges the LlmBackend trait to the core LanguageModel trait and applies
//! the per-call timeout, so every backend fault reaches the dialogue engine
//! as a `DialogueError`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use call_screen_core::{DialogueError, GenerateRequest, GenerateResponse, LanguageModel};

use crate::backend::LlmBackend;
use crate::LlmError;

/// Adapter that wraps an LlmBackend to implement the core LanguageModel trait.
///
/// ```ignore
/// let backend = OpenAIBackend::new(config)?;
/// let llm: Arc<dyn LanguageModel> = Arc::new(
///     LanguageModelAdapter::new(backend).with_timeout(Duration::from_secs(20))
/// );
/// ```
pub struct LanguageModelAdapter {
    backend: Arc<dyn LlmBackend>,
    model_name: String,
    timeout: Option<Duration>,
}

impl LanguageModelAdapter {
    pub fn new<B: LlmBackend + 'static>(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<dyn LlmBackend>) -> Self {
        let model_name = backend.model_name().to_string();
        Self {
            backend,
            model_name,
            timeout: None,
        }
    }

    /// Bound the whole generate call, retries included
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl LanguageModel for LanguageModelAdapter {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, DialogueError> {
        let call = self.backend.generate(&request);

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(limit)),
            },
            None => call.await,
        };

        let result = result.map_err(|e| {
            tracing::warn!(model = %self.model_name, error = %e, "LLM generation failed");
            DialogueError::from(e)
        })?;

        if result.text.trim().is_empty() {
            return Err(DialogueError::EmptyResponse);
        }

        tracing::debug!(
            model = %self.model_name,
            latency_ms = result.total_time_ms,
            "LLM generation complete"
        );

        Ok(GenerateResponse {
            text: result.text,
            finish_reason: result.finish_reason,
            usage: result.usage,
        })
    }

    async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
