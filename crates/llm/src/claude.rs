//! Anthropic Messages API backend
//!
//! The Messages API takes the system instruction as a separate field and
//! requires the conversation to start with a user message and alternate
//! roles. Call transcripts don't always satisfy that (an apology can follow
//! an assistant reply), so consecutive same-role messages are merged.

use std::time::Instant;

use async_trait::async_trait;
use call_screen_core::{FinishReason, GenerateRequest, Message, Role, TokenUsage};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backend::{status_error, with_retries, GenerationResult, LlmBackend, LlmConfig};
use crate::LlmError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Placeholder user turn when a transcript opens with the assistant
const CALL_CONNECTED: &str = "(call connected)";

/// Claude backend
pub struct ClaudeBackend {
    config: LlmConfig,
    client: Client,
}

impl ClaudeBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(LlmError::Configuration(
                "ANTHROPIC_API_KEY not set. Set it via environment or config.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.endpoint.trim_end_matches('/'))
    }

    /// Convert messages to Claude format
    fn convert_messages(messages: &[Message]) -> Vec<ClaudeMessage> {
        let mut converted: Vec<ClaudeMessage> = Vec::new();

        for message in messages.iter().filter(|m| m.role != Role::System) {
            let role = match message.role {
                Role::Assistant => "assistant",
                _ => "user",
            };

            if converted.is_empty() && role == "assistant" {
                converted.push(ClaudeMessage {
                    role: "user",
                    content: CALL_CONNECTED.to_string(),
                });
            }

            match converted.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push('\n');
                    last.content.push_str(&message.content);
                }
                _ => converted.push(ClaudeMessage {
                    role,
                    content: message.content.clone(),
                }),
            }
        }

        converted
    }

    fn build_request(&self, request: &GenerateRequest) -> ClaudeRequest {
        let mut system = request.system_prompt().map(str::to_string);
        if request.json_mode {
            let hint = "Respond with a single JSON object and nothing else.";
            system = Some(match system {
                Some(s) => format!("{}\n\n{}", s, hint),
                None => hint.to_string(),
            });
        }

        ClaudeRequest {
            model: self.config.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            messages: Self::convert_messages(&request.messages),
            system,
            // Anthropic caps temperature at 1.0
            temperature: Some(
                request
                    .temperature
                    .unwrap_or(self.config.temperature)
                    .clamp(0.0, 1.0),
            ),
        }
    }

    async fn execute_request(&self, body: &ClaudeRequest) -> Result<ClaudeApiResponse, LlmError> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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
impl LlmBackend for ClaudeBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let body = self.build_request(request);

        let response = with_retries(&self.config, || self.execute_request(&body)).await?;

        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                ClaudeContentBlock::Text { text } => Some(text.as_str()),
                ClaudeContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(GenerationResult {
            text,
            finish_reason: response
                .stop_reason
                .as_deref()
                .map(FinishReason::from_provider)
                .unwrap_or_default(),
            usage: Some(TokenUsage::new(
                response.usage.input_tokens,
                response.usage.output_tokens,
            )),
            total_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn is_available(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// Claude API types
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeApiResponse {
    content: Vec<ClaudeContentBlock>,
    stop_reason: Option<String>,
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}
