//! Audio types at the speech adapter boundaries

use serde::{Deserialize, Serialize};

use crate::TranscriptionError;

/// Caller audio handed to the transcription adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AudioSource {
    /// Network-addressable recording (e.g. a telephony media URL)
    Url { url: String },
    /// Buffered audio bytes with their MIME type
    Bytes { data: Vec<u8>, mime_type: String },
}

impl AudioSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    pub fn bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::Bytes {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Short description for logs (never the raw bytes)
    pub fn describe(&self) -> String {
        match self {
            Self::Url { url } => url.clone(),
            Self::Bytes { data, mime_type } => format!("{} bytes of {}", data.len(), mime_type),
        }
    }
}

/// Outcome of one transcription attempt
///
/// Exactly one of text+confidence or an error is ever present.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionResult {
    Transcribed { text: String, confidence: f32 },
    Failed(TranscriptionError),
}

impl TranscriptionResult {
    /// Build a successful result, rejecting empty transcripts
    ///
    /// Confidence is clamped into [0, 1].
    pub fn transcribed(text: impl Into<String>, confidence: f32) -> Self {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::Failed(TranscriptionError::EmptyTranscript);
        }
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self::Transcribed {
            text: trimmed.to_string(),
            confidence,
        }
    }

    pub fn failed(error: TranscriptionError) -> Self {
        Self::Failed(error)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Transcribed { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Transcribed { text, .. } => Some(text),
            Self::Failed(_) => None,
        }
    }

    pub fn confidence(&self) -> Option<f32> {
        match self {
            Self::Transcribed { confidence, .. } => Some(*confidence),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&TranscriptionError> {
        match self {
            Self::Transcribed { .. } => None,
            Self::Failed(e) => Some(e),
        }
    }
}

/// Complete synthesized utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedAudio {
    /// Encoded audio, start to end
    pub data: Vec<u8>,
    /// MIME type of `data` (e.g. "audio/mpeg")
    pub content_type: String,
}

impl SynthesizedAudio {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Voice selection for synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Provider voice identifier
    pub voice_id: String,
    /// Provider model identifier (optional override)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

impl VoiceConfig {
    pub fn new(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            model_id: None,
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_transcript_is_failure() {
        let result = TranscriptionResult::transcribed("   ", 0.99);
        assert!(!result.is_success());
        assert_eq!(result.error(), Some(&TranscriptionError::EmptyTranscript));
        assert!(result.text().is_none());
    }

    #[test]
    fn test_confidence_clamped() {
        let result = TranscriptionResult::transcribed(" hello ", 1.7);
        assert_eq!(result.text(), Some("hello"));
        assert_eq!(result.confidence(), Some(1.0));

        let result = TranscriptionResult::transcribed("hello", f32::NAN);
        assert_eq!(result.confidence(), Some(0.0));
    }

    #[test]
    fn test_audio_source_describe() {
        let src = AudioSource::bytes(vec![0u8; 320], "audio/wav");
        assert_eq!(src.describe(), "320 bytes of audio/wav");
        let src = AudioSource::url("https://media.example.com/seg-1.wav");
        assert!(src.describe().ends_with("seg-1.wav"));
    }

    #[test]
    fn test_audio_source_serde_tagging() {
        let src: AudioSource =
            serde_json::from_str(r#"{"type":"url","url":"https://x/y.wav"}"#).unwrap();
        assert_eq!(src, AudioSource::url("https://x/y.wav"));
    }
}
