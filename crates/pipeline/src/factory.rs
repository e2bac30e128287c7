//! Adapter construction from settings

use std::sync::Arc;
use std::time::Duration;

use call_screen_config::{SttSettings, TtsSettings};
use call_screen_core::{SpeechToText, TextToSpeech};

use crate::stt::{DeepgramStt, SttConfig};
use crate::tts::{ElevenLabsTts, TtsConfig};
use crate::PipelineError;

/// Create the transcription adapter
pub fn create_stt(settings: &SttSettings) -> Result<Arc<dyn SpeechToText>, PipelineError> {
    settings
        .validate()
        .map_err(|e| PipelineError::Configuration(e.to_string()))?;

    let stt = DeepgramStt::new(SttConfig {
        endpoint: settings.endpoint.clone(),
        api_key: settings.resolved_api_key(),
        model: settings.model.clone(),
        language: settings.language.clone(),
        timeout: Duration::from_millis(settings.timeout_ms),
    })?;

    Ok(Arc::new(stt))
}

/// Create the synthesis adapter
pub fn create_tts(settings: &TtsSettings) -> Result<Arc<dyn TextToSpeech>, PipelineError> {
    settings
        .validate()
        .map_err(|e| PipelineError::Configuration(e.to_string()))?;

    let tts = ElevenLabsTts::new(TtsConfig {
        endpoint: settings.endpoint.clone(),
        api_key: settings.resolved_api_key(),
        model_id: settings.model_id.clone(),
        timeout: Duration::from_millis(settings.timeout_ms),
    })?;

    tracing::info!(
        endpoint = %settings.endpoint,
        model = %settings.model_id,
        "ElevenLabs TTS adapter created"
    );

    Ok(Arc::new(tts))
}
