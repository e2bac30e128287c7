//! Call screening agent
//!
//! Features:
//! - Dialogue engine holding the persona and the append-only transcript
//! - Rule-based and model-based call summary extraction
//! - Per-call state machine with validated transitions
//! - Turn orchestration: transcribe → generate → synthesize → play
//! - Stage and turn latency metrics
//! - Summary handoff (structured log or webhook)

pub mod dialogue;
pub mod handoff;
pub mod latency;
pub mod session;
pub mod state;
pub mod summary;

pub use dialogue::{truncate_to_words, DialogueEngine};
pub use handoff::{create_handoff, LogHandoff, WebhookHandoff};
pub use latency::{Stage, TurnLatency, TurnTimer};
pub use session::{
    is_end_intent, CallAdapters, CallEvent, CallHandle, CallSession, SessionInput, TurnOutcome,
};
pub use state::{CallState, CallStateMachine, StateTransition};
pub use summary::{ExtractiveSummarizer, GenerativeSummarizer, SummaryFields};

use thiserror::Error;

/// Call orchestration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: CallState, to: CallState },

    #[error("Call has already ended")]
    CallEnded,

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<call_screen_core::Error> for CallError {
    fn from(err: call_screen_core::Error) -> Self {
        match err {
            call_screen_core::Error::InvalidProfile(msg) => CallError::InvalidProfile(msg),
            other => CallError::Configuration(other.to_string()),
        }
    }
}
