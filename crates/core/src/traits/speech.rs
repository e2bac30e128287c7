//! Speech processing traits

use async_trait::async_trait;

use crate::{AudioSource, SynthesisError, SynthesizedAudio, TranscriptionResult, VoiceConfig};

/// Speech-to-Text interface
///
/// Implementations never panic or return an untyped fault: every outcome,
/// including network failures and empty speech, is reported through
/// [`TranscriptionResult`].
///
/// # Example
///
/// ```ignore
/// let stt: Arc<dyn SpeechToText> = Arc::new(DeepgramStt::new(config)?);
/// let result = stt.transcribe(&AudioSource::url(media_url)).await;
/// if let Some(text) = result.text() {
///     println!("Caller said: {}", text);
/// }
/// ```
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Transcribe one complete caller segment
    async fn transcribe(&self, audio: &AudioSource) -> TranscriptionResult;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

/// Text-to-Speech interface
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Synthesize one complete utterance
    ///
    /// Returns [`SynthesisError::EmptyAudio`] rather than a zero-length
    /// buffer.
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceConfig,
    ) -> Result<SynthesizedAudio, SynthesisError>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
