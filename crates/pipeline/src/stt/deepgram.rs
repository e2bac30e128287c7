//! Deepgram STT adapter
//!
//! Sends one complete caller segment to Deepgram's prerecorded `/v1/listen`
//! endpoint. Network-addressable audio is passed by URL; buffered audio is
//! uploaded as the request body.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use call_screen_core::{AudioSource, SpeechToText, TranscriptionError, TranscriptionResult};
use serde::Deserialize;

use crate::PipelineError;

/// Deepgram adapter configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Base URL of the Deepgram API
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Model name (e.g. "nova-3")
    pub model: String,
    /// Optional language hint
    pub language: Option<String>,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepgram.com".to_string(),
            api_key: None,
            model: "nova-3".to_string(),
            language: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Response body from `/v1/listen`
#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f32,
}

/// Deepgram speech-to-text
pub struct DeepgramStt {
    config: SttConfig,
    client: reqwest::Client,
}

impl DeepgramStt {
    pub fn new(config: SttConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::Client(e.to_string()))?;

        tracing::info!(
            endpoint = %config.endpoint,
            model = %config.model,
            "Deepgram STT adapter created"
        );

        Ok(Self { config, client })
    }

    fn listen_url(&self) -> String {
        format!("{}/v1/listen", self.config.endpoint.trim_end_matches('/'))
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("model", self.config.model.clone()),
            ("smart_format", "true".to_string()),
        ];
        if let Some(language) = &self.config.language {
            query.push(("language", language.clone()));
        }
        query
    }

    fn build_request(&self, audio: &AudioSource) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(self.listen_url()).query(&self.query());

        if let Some(key) = self.config.api_key.as_deref() {
            builder = builder.header("Authorization", format!("Token {}", key));
        }

        match audio {
            AudioSource::Url { url } => builder.json(&serde_json::json!({ "url": url })),
            AudioSource::Bytes { data, mime_type } => builder
                .header("Content-Type", mime_type.as_str())
                .body(data.clone()),
        }
    }

    /// Pull the first alternative out of a response body
    fn parse_response(body: &str) -> TranscriptionResult {
        let parsed: ListenResponse = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return TranscriptionResult::failed(TranscriptionError::InvalidResponse(
                    e.to_string(),
                ))
            }
        };

        match parsed
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
        {
            Some(alt) => TranscriptionResult::transcribed(alt.transcript, alt.confidence),
            None => TranscriptionResult::failed(TranscriptionError::InvalidResponse(
                "response has no transcription alternatives".to_string(),
            )),
        }
    }

    async fn request(&self, audio: &AudioSource) -> Result<String, TranscriptionError> {
        let response = self.build_request(audio).send().await.map_err(|e| {
            if e.is_timeout() {
                TranscriptionError::Timeout(self.config.timeout)
            } else {
                TranscriptionError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(TranscriptionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl SpeechToText for DeepgramStt {
    async fn transcribe(&self, audio: &AudioSource) -> TranscriptionResult {
        let start = Instant::now();

        let body = match tokio::time::timeout(self.config.timeout, self.request(audio)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return TranscriptionResult::failed(e),
            Err(_) => {
                return TranscriptionResult::failed(TranscriptionError::Timeout(
                    self.config.timeout,
                ))
            }
        };

        let result = Self::parse_response(&body);

        match &result {
            TranscriptionResult::Transcribed { text, confidence } => tracing::debug!(
                chars = text.len(),
                confidence = *confidence,
                latency_ms = start.elapsed().as_millis() as u64,
                "Deepgram transcription complete"
            ),
            TranscriptionResult::Failed(e) => tracing::warn!(
                source = %audio.describe(),
                error = %e,
                "Deepgram transcription failed"
            ),
        }

        result
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
