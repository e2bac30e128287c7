//! ElevenLabs TTS adapter

use std::time::{Duration, Instant};

use async_trait::async_trait;
use call_screen_core::{SynthesisError, SynthesizedAudio, TextToSpeech, VoiceConfig};
use serde::Serialize;

use crate::PipelineError;

const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

/// ElevenLabs adapter configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Model used when the voice config doesn't pick one
    pub model_id: String,
    pub timeout: Duration,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.elevenlabs.io".to_string(),
            api_key: None,
            model_id: "eleven_monolingual_v1".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// ElevenLabs text-to-speech
pub struct ElevenLabsTts {
    config: TtsConfig,
    client: reqwest::Client,
}

impl ElevenLabsTts {
    pub fn new(config: TtsConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::Client(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn synthesis_url(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.config.endpoint.trim_end_matches('/'),
            voice_id
        )
    }

    fn build_request(&self, text: &str, voice: &VoiceConfig) -> reqwest::RequestBuilder {
        let model_id = voice.model_id.as_deref().unwrap_or(&self.config.model_id);
        let mut builder = self
            .client
            .post(self.synthesis_url(&voice.voice_id))
            .header("Accept", DEFAULT_CONTENT_TYPE)
            .json(&SynthesisRequest { text, model_id });

        if let Some(key) = self.config.api_key.as_deref() {
            builder = builder.header("xi-api-key", key);
        }
        builder
    }

    async fn request(
        &self,
        text: &str,
        voice: &VoiceConfig,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let response = self
            .build_request(text, voice)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let data = response.bytes().await.map_err(|e| self.transport_error(e))?;

        if data.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        Ok(SynthesizedAudio::new(data.to_vec(), content_type))
    }

    fn transport_error(&self, err: reqwest::Error) -> SynthesisError {
        if err.is_timeout() {
            SynthesisError::Timeout(self.config.timeout)
        } else {
            SynthesisError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl TextToSpeech for ElevenLabsTts {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceConfig,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let start = Instant::now();
        let audio = tokio::time::timeout(self.config.timeout, self.request(text, voice))
            .await
            .map_err(|_| SynthesisError::Timeout(self.config.timeout))?
            .map_err(|e| {
                tracing::warn!(voice_id = %voice.voice_id, error = %e, "ElevenLabs synthesis failed");
                e
            })?;

        tracing::debug!(
            voice_id = %voice.voice_id,
            bytes = audio.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "ElevenLabs synthesis complete"
        );

        Ok(audio)
    }

    fn model_name(&self) -> &str {
        &self.config.model_id
    }
}
