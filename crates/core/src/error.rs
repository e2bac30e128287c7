//! Error kinds for every adapter boundary
//!
//! Each external capability fault is converted to exactly one of these kinds
//! with the underlying detail preserved, so nothing untyped reaches the
//! orchestrator.

use std::time::Duration;
use thiserror::Error;

/// Speech recognition failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranscriptionError {
    #[error("Transcription service unreachable: {0}")]
    Unreachable(String),

    #[error("Transcription service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid transcription response: {0}")]
    InvalidResponse(String),

    #[error("Transcription returned no speech")]
    EmptyTranscript,

    #[error("Transcription confidence {confidence:.2} below threshold {threshold:.2}")]
    LowConfidence { confidence: f32, threshold: f32 },

    #[error("Transcription timed out after {0:?}")]
    Timeout(Duration),
}

/// Language generation failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DialogueError {
    #[error("Generation service unavailable: {0}")]
    Unavailable(String),

    #[error("Generation service rejected request: {0}")]
    Api(String),

    #[error("Invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("Generation returned empty output")]
    EmptyResponse,

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),
}

/// Speech synthesis failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("Synthesis service unreachable: {0}")]
    Unreachable(String),

    #[error("Synthesis service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Synthesis returned empty audio")]
    EmptyAudio,

    #[error("Nothing to synthesize")]
    EmptyText,

    #[error("Synthesis timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure delivering audio to the caller channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("Caller channel closed")]
    ChannelClosed,

    #[error("Playback failed: {0}")]
    Failed(String),
}

/// Failure delivering the call summary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandoffError {
    #[error("Handoff delivery failed: {0}")]
    Delivery(String),

    #[error("Handoff target rejected summary: HTTP {0}")]
    Rejected(u16),
}

/// Umbrella error for code that spans several boundaries
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error(transparent)]
    Dialogue(#[from] DialogueError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),
}

pub type Result<T> = std::result::Result<T, Error>;
