//! Language Model trait

use async_trait::async_trait;

use crate::{DialogueError, GenerateRequest, GenerateResponse};

/// Language Model interface
///
/// ```ignore
/// let llm: Arc<dyn LanguageModel> = Arc::new(LanguageModelAdapter::new(backend));
/// let request = GenerateRequest::new(system_instructions)
///     .with_user_message("Hi, this is Jordan");
/// let response = llm.generate(request).await?;
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Generate a completion for the given history
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, DialogueError>;

    /// Check if the backend is reachable
    async fn is_available(&self) -> bool {
        true
    }

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
