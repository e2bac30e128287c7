//! LLM Backend implementations
//!
//! Two wire formats live here: the OpenAI chat completions API (also served
//! by most hosted and local gateways) and Ollama's native `/api/chat`. The
//! Anthropic Messages API is in [`crate::claude`].

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use call_screen_core::{FinishReason, GenerateRequest, Message, TokenUsage};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::LlmError;

/// Backend configuration shared by every provider
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// API base URL
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Default maximum tokens (a request may override)
    pub max_tokens: u32,
    /// Default temperature (a request may override)
    pub temperature: f32,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff (doubles each retry)
    pub initial_backoff: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            max_tokens: 200,
            temperature: 0.7,
            timeout: Duration::from_secs(20),
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl LlmConfig {
    pub fn new(model: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    fn build_client(&self) -> Result<Client, LlmError> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))
    }
}

/// LLM generation result
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Option<TokenUsage>,
    /// Total generation time including retries (ms)
    pub total_time_ms: u64,
}

/// LLM Backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response for the request's messages
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerationResult, LlmError>;

    /// Check if model is available
    async fn is_available(&self) -> bool;

    fn model_name(&self) -> &str;
}

/// Run `attempt` until it succeeds, fails permanently, or retries run out
///
/// Only [`LlmError::is_retryable`] errors are retried; the wait starts at
/// `initial_backoff` and doubles each time.
pub(crate) async fn with_retries<T, F, Fut>(
    config: &LlmConfig,
    mut attempt: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut last_error = None;
    let mut backoff = config.initial_backoff;

    for n in 0..=config.max_retries {
        if n > 0 {
            tracing::warn!(
                model = %config.model,
                attempt = n,
                max_retries = config.max_retries,
                backoff_ms = backoff.as_millis() as u64,
                "LLM request failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => last_error = Some(e),
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| LlmError::Network("Max retries exceeded".to_string())))
}

/// Read an error body and classify the status: 5xx and 429 retry, the rest don't
pub(crate) async fn status_error(response: reqwest::Response) -> LlmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() || status.as_u16() == 429 {
        LlmError::Network(format!("HTTP {}: {}", status, body))
    } else {
        LlmError::Api(format!("HTTP {}: {}", status, body))
    }
}

// =============================================================================
// OpenAI-compatible backend
// =============================================================================

/// OpenAI chat completions backend
///
/// Works with OpenAI and any server exposing `/chat/completions`.
pub struct OpenAIBackend {
    config: LlmConfig,
    client: Client,
}

impl OpenAIBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let has_key = config.api_key.as_ref().is_some_and(|k| !k.is_empty());
        let is_local = config.endpoint.starts_with("http://localhost")
            || config.endpoint.starts_with("http://127.0.0.1");
        if !has_key && !is_local {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = config.build_client()?;
        Ok(Self { config, client })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url())
    }

    fn build_request(&self, request: &GenerateRequest) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.config.model.clone(),
            messages: request.messages.iter().map(OpenAIMessage::from).collect(),
            max_tokens: Some(request.max_tokens.unwrap_or(self.config.max_tokens)),
            temperature: Some(request.temperature.unwrap_or(self.config.temperature)),
            response_format: request.json_mode.then(|| OpenAIResponseFormat {
                kind: "json_object".to_string(),
            }),
        }
    }

    async fn execute_request(
        &self,
        body: &OpenAIChatRequest,
    ) -> Result<OpenAIChatResponse, LlmError> {
        let mut builder = self.client.post(self.chat_url()).json(body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.config.timeout))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let body = self.build_request(request);

        let response = with_retries(&self.config, || self.execute_request(&body)).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        Ok(GenerationResult {
            text: choice.message.content.unwrap_or_default(),
            finish_reason: choice
                .finish_reason
                .as_deref()
                .map(FinishReason::from_provider)
                .unwrap_or_default(),
            usage: response
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
            total_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn is_available(&self) -> bool {
        let mut builder = self
            .client
            .get(format!("{}/models", self.config.base_url()))
            .timeout(Duration::from_secs(5));
        if let Some(key) = self.config.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }
        builder
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

impl From<&Message> for OpenAIMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// =============================================================================
// Ollama backend
// =============================================================================

/// Ollama backend for local models
#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    config: LlmConfig,
}

impl OllamaBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = config.build_client()?;
        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.base_url(), path)
    }

    fn build_request(&self, request: &GenerateRequest) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.config.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: false,
            format: request.json_mode.then(|| "json".to_string()),
            options: OllamaOptions {
                temperature: Some(request.temperature.unwrap_or(self.config.temperature)),
                num_predict: Some(request.max_tokens.unwrap_or(self.config.max_tokens) as i32),
            },
        }
    }

    async fn execute_request(
        &self,
        body: &OllamaChatRequest,
    ) -> Result<OllamaChatResponse, LlmError> {
        let response = self
            .client
            .post(self.api_url("/chat"))
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.config.timeout))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let body = self.build_request(request);

        let response = with_retries(&self.config, || self.execute_request(&body)).await?;

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (Some(p), Some(c)) => Some(TokenUsage::new(p, c)),
            _ => None,
        };

        Ok(GenerationResult {
            text: response.message.content,
            finish_reason: match response.done_reason.as_deref() {
                Some(reason) => FinishReason::from_provider(reason),
                None if response.done => FinishReason::Stop,
                None => FinishReason::Length,
            },
            usage,
            total_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(self.api_url("/tags"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unreachable_config() -> LlmConfig {
        LlmConfig::new("test-model", "http://127.0.0.1:9")
            .with_timeout(Duration::from_millis(500))
            .with_retries(0)
    }

    #[test]
    fn test_openai_backend_requires_key_for_remote() {
        let config = LlmConfig::default();
        assert!(OpenAIBackend::new(config).is_err());

        let config = LlmConfig::default().with_api_key("sk-test");
        assert!(OpenAIBackend::new(config).is_ok());

        assert!(OpenAIBackend::new(unreachable_config()).is_ok());
    }

    #[test]
    fn test_openai_request_serialization() {
        let backend = OpenAIBackend::new(LlmConfig::default().with_api_key("sk-test")).unwrap();
        let request = GenerateRequest::new("You answer calls for Alex")
            .with_user_message("Hello")
            .with_json_mode(true)
            .with_temperature(0.0);

        let json = serde_json::to_value(backend.build_request(&request)).unwrap();
        assert_eq!(json["model"], "gpt-4-turbo");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["max_tokens"], 200);
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(
            backend.chat_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_openai_response_parsing() {
        let raw = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: OpenAIChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi there"));
        assert_eq!(parsed.usage.unwrap().completion_tokens, 3);
    }

    #[test]
    fn test_ollama_request_serialization() {
        let backend = OllamaBackend::new(unreachable_config()).unwrap();
        let request = GenerateRequest::new("system").with_user_message("hi");
        let json = serde_json::to_value(backend.build_request(&request)).unwrap();

        assert_eq!(json["stream"], false);
        assert!(json.get("format").is_none());
        assert_eq!(json["options"]["num_predict"], 200);
        assert_eq!(backend.api_url("/chat"), "http://127.0.0.1:9/api/chat");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let backend = OllamaBackend::new(unreachable_config()).unwrap();
        let request = GenerateRequest::new("system").with_user_message("hi");

        let err = backend.generate(&request).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err:?}");
        assert!(!backend.is_available().await);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let config = LlmConfig::default()
            .with_retries(3)
            .with_timeout(Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        let result: Result<(), LlmError> = with_retries(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Api("bad request".into())) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Api(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let config = LlmConfig {
            initial_backoff: Duration::from_millis(1),
            ..LlmConfig::default().with_retries(2)
        };
        let calls = AtomicU32::new(0);

        let result = with_retries(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(LlmError::Network("reset".into()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
