//! Core traits and types for the call screening assistant
//!
//! This crate provides foundational types used across all other crates:
//! - Adapter traits for pluggable capabilities (STT, TTS, LLM, playback, handoff)
//! - Audio source and synthesized audio types
//! - Caller profile (persona) definition
//! - Conversation turns and the append-only transcript
//! - Call summary types
//! - Typed error kinds for every adapter boundary

pub mod audio;
pub mod conversation;
pub mod error;
pub mod llm_types;
pub mod profile;
pub mod summary;
pub mod traits;

pub use audio::{AudioSource, SynthesizedAudio, TranscriptionResult, VoiceConfig};
pub use conversation::{Speaker, Transcript, Turn, TurnKind};
pub use error::{
    DialogueError, Error, HandoffError, PlaybackError, Result, SynthesisError, TranscriptionError,
};
pub use llm_types::{FinishReason, GenerateRequest, GenerateResponse, Message, Role, TokenUsage};
pub use profile::Profile;
pub use summary::{CallSummary, CallbackInfo, EndReason, Urgency};

pub use traits::{AudioSink, LanguageModel, SpeechToText, SummaryHandoff, TextToSpeech};
