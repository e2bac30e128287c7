//! Call summary handed to the screened person at call end

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a call ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum EndReason {
    /// Caller hung up
    Hangup,
    /// Caller signalled they were done and the farewell was spoken
    CallerFinished,
    /// Too many consecutive segments could not be transcribed
    TranscriptionExhausted,
    /// Call exceeded the configured maximum duration
    MaxDuration,
    /// Generation failed
    DialogueFailure(String),
    /// Synthesis failed
    SynthesisFailure(String),
    /// Audio could not be delivered to the caller
    PlaybackFailure(String),
}

impl EndReason {
    /// Whether the call ended because a stage failed
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::DialogueFailure(_) | Self::SynthesisFailure(_) | Self::PlaybackFailure(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Hangup => "hangup",
            Self::CallerFinished => "caller_finished",
            Self::TranscriptionExhausted => "transcription_exhausted",
            Self::MaxDuration => "max_duration",
            Self::DialogueFailure(_) => "dialogue_failure",
            Self::SynthesisFailure(_) => "synthesis_failure",
            Self::PlaybackFailure(_) => "playback_failure",
        }
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DialogueFailure(d) | Self::SynthesisFailure(d) | Self::PlaybackFailure(d) => {
                write!(f, "{}: {}", self.label(), d)
            }
            _ => write!(f, "{}", self.label()),
        }
    }
}

/// Message urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Low,
    Medium,
    High,
}

impl Urgency {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" | "urgent" => Some(Self::High),
            _ => None,
        }
    }
}

/// How the caller wants to be reached back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<String>,
}

impl CallbackInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.number.is_none() && self.preferred_time.is_none()
    }
}

/// Structured extraction produced once per call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub session_id: String,
    /// Name of the person screened
    pub screened_for: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackInfo>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
    pub turn_count: usize,
    pub duration_secs: u64,
    pub created_at: DateTime<Utc>,
}

impl CallSummary {
    pub fn new(session_id: impl Into<String>, screened_for: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            screened_for: screened_for.into(),
            caller_name: None,
            caller_company: None,
            purpose: None,
            callback: None,
            action_items: Vec::new(),
            urgency: Urgency::Low,
            end_reason: None,
            turn_count: 0,
            duration_secs: 0,
            created_at: Utc::now(),
        }
    }

    pub fn needs_callback(&self) -> bool {
        self.callback.as_ref().map(|c| !c.is_empty()).unwrap_or(false)
    }

    /// One-line human readable digest for notifications
    pub fn headline(&self) -> String {
        let who = match (&self.caller_name, &self.caller_company) {
            (Some(name), Some(company)) => format!("{} ({})", name, company),
            (Some(name), None) => name.clone(),
            (None, Some(company)) => format!("Someone from {}", company),
            (None, None) => "Unknown caller".to_string(),
        };
        match &self.purpose {
            Some(purpose) => format!("{} called about {}", who, purpose),
            None => format!("{} called", who),
        }
    }
}
