//! Conversation types: speakers, turns and the append-only transcript

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The person who called
    Caller,
    /// The screening assistant
    Assistant,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Caller => "caller",
            Speaker::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What role a turn plays in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// Regular conversational utterance
    #[default]
    Utterance,
    /// Repeat prompt injected after transcription failed
    Apology,
    /// Generic failure notice spoken before the call ends
    Notice,
}

/// A single utterance, immutable once recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: String,
    /// Transcription confidence (caller turns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub kind: TurnKind,
}

impl Turn {
    /// Create a caller turn from a transcription
    pub fn caller(content: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            speaker: Speaker::Caller,
            content: content.into(),
            confidence,
            timestamp: Utc::now(),
            kind: TurnKind::Utterance,
        }
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            content: content.into(),
            confidence: None,
            timestamp: Utc::now(),
            kind: TurnKind::Utterance,
        }
    }

    /// Create an assistant apology turn
    pub fn apology(content: impl Into<String>) -> Self {
        Self {
            kind: TurnKind::Apology,
            ..Self::assistant(content)
        }
    }

    /// Create an assistant failure notice turn
    pub fn notice(content: impl Into<String>) -> Self {
        Self {
            kind: TurnKind::Notice,
            ..Self::assistant(content)
        }
    }

    /// Get word count
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    pub fn is_utterance(&self) -> bool {
        self.kind == TurnKind::Utterance
    }
}

/// Ordered, append-only record of every turn in one call
///
/// Past turns are never exposed mutably. Timestamps are forced to be
/// non-decreasing so insertion order and time order always agree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, returning a reference to the stored copy
    pub fn push(&mut self, mut turn: Turn) -> &Turn {
        if let Some(last) = self.turns.last() {
            if turn.timestamp < last.timestamp {
                turn.timestamp = last.timestamp;
            }
        }
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Turns spoken by the caller
    pub fn caller_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.speaker == Speaker::Caller)
    }

    /// Number of regular assistant utterances so far
    pub fn assistant_utterances(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.speaker == Speaker::Assistant && t.is_utterance())
            .count()
    }

    /// Whether regular utterances strictly alternate caller → assistant
    ///
    /// Apology and notice turns are ignored. A trailing caller turn without
    /// a reply is allowed (the call may end mid-turn).
    pub fn utterances_alternate(&self) -> bool {
        let mut expected = Speaker::Caller;
        for turn in self.turns.iter().filter(|t| t.is_utterance()) {
            if turn.speaker != expected {
                return false;
            }
            expected = match expected {
                Speaker::Caller => Speaker::Assistant,
                Speaker::Assistant => Speaker::Caller,
            };
        }
        true
    }

    /// Whether timestamps never go backwards
    pub fn is_chronological(&self) -> bool {
        self.turns
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }
}
