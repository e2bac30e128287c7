//! Per-call pipeline state machine
//!
//! ```text
//! Idle → Listening → Transcribing → Generating → Synthesizing → Speaking
//!            ▲            │              │             │            │
//!            └────────────┴──────────────┼─────────────┼────────────┘
//!                   (apology)            ▼             ▼
//!                                      Ended  ◀──── (any state)
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use call_screen_core::EndReason;

use crate::CallError;

/// Pipeline state of one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// Session created, no audio yet
    Idle,
    /// Awaiting caller audio
    Listening,
    /// Segment handed to the transcription adapter
    Transcribing,
    /// Caller text handed to the dialogue engine
    Generating,
    /// Reply handed to the synthesis adapter
    Synthesizing,
    /// Audio being delivered to the caller
    Speaking,
    /// Terminal
    Ended,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::Listening => "listening",
            CallState::Transcribing => "transcribing",
            CallState::Generating => "generating",
            CallState::Synthesizing => "synthesizing",
            CallState::Speaking => "speaking",
            CallState::Ended => "ended",
        }
    }

    /// States reachable from this one
    ///
    /// Every non-terminal state can end: hangup may arrive at any point.
    pub fn valid_transitions(&self) -> &'static [CallState] {
        match self {
            CallState::Idle => &[CallState::Listening, CallState::Ended],
            CallState::Listening => &[CallState::Transcribing, CallState::Ended],
            CallState::Transcribing => &[
                CallState::Generating,
                CallState::Listening,
                CallState::Ended,
            ],
            CallState::Generating => &[CallState::Synthesizing, CallState::Ended],
            CallState::Synthesizing => &[CallState::Speaking, CallState::Ended],
            CallState::Speaking => &[CallState::Listening, CallState::Ended],
            CallState::Ended => &[],
        }
    }

    pub fn can_transition_to(&self, to: CallState) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        *self == CallState::Ended
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recorded state change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTransition {
    pub from: CallState,
    pub to: CallState,
    pub at: DateTime<Utc>,
}

/// Current state, transition history and end reason of one call
#[derive(Debug, Clone)]
pub struct CallStateMachine {
    current: CallState,
    history: Vec<StateTransition>,
    end_reason: Option<EndReason>,
}

impl CallStateMachine {
    pub fn new() -> Self {
        Self {
            current: CallState::Idle,
            history: Vec::new(),
            end_reason: None,
        }
    }

    pub fn current(&self) -> CallState {
        self.current
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    pub fn end_reason(&self) -> Option<&EndReason> {
        self.end_reason.as_ref()
    }

    pub fn is_ended(&self) -> bool {
        self.current.is_terminal()
    }

    /// Move to `to`, validating against the transition table
    ///
    /// Ending must go through [`CallStateMachine::end`] so the reason is kept.
    pub fn transition(&mut self, to: CallState) -> Result<StateTransition, CallError> {
        let from = self.current;
        if to == CallState::Ended || !from.can_transition_to(to) {
            return Err(CallError::InvalidTransition { from, to });
        }
        Ok(self.record(to))
    }

    /// End the call, keeping the first reason given
    ///
    /// Returns `None` when the call had already ended.
    pub fn end(&mut self, reason: EndReason) -> Option<StateTransition> {
        if self.is_ended() {
            return None;
        }
        self.end_reason = Some(reason);
        Some(self.record(CallState::Ended))
    }

    fn record(&mut self, to: CallState) -> StateTransition {
        let transition = StateTransition {
            from: self.current,
            to,
            at: Utc::now(),
        };
        self.current = to;
        self.history.push(transition.clone());
        transition
    }
}

impl Default for CallStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
