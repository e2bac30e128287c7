//! Delivery collaborators: caller playback and summary handoff

use async_trait::async_trait;

use crate::{CallSummary, HandoffError, PlaybackError, SynthesizedAudio};

/// Plays synthesized audio to the caller
///
/// The telephony channel behind this is outside the pipeline; the
/// orchestrator only needs to know whether the audio got through.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    async fn play(&self, session_id: &str, audio: &SynthesizedAudio) -> Result<(), PlaybackError>;
}

/// Receives the call summary once the call has ended
#[async_trait]
pub trait SummaryHandoff: Send + Sync + 'static {
    async fn deliver(&self, summary: &CallSummary) -> Result<(), HandoffError>;

    /// Name for logging
    fn name(&self) -> &str;
}
