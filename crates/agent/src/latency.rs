//! Per-turn latency tracking
//!
//! Latency is observed for monitoring only. Every stage duration is recorded
//! into the `call_screen_stage_latency_seconds` histogram (labelled by stage)
//! and the end-to-end turn into `call_screen_turn_latency_seconds`.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Timed pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcription,
    Generation,
    Synthesis,
    Playback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transcription => "transcription",
            Stage::Generation => "generation",
            Stage::Synthesis => "synthesis",
            Stage::Playback => "playback",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stage timings for one completed turn, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TurnLatency {
    pub transcription_ms: u64,
    pub generation_ms: u64,
    pub synthesis_ms: u64,
    pub playback_ms: u64,
    /// Entering Transcribing to finishing Speaking
    pub total_ms: u64,
}

/// Measures one turn from the moment transcription starts
#[derive(Debug)]
pub struct TurnTimer {
    started: Instant,
    latency: TurnLatency,
}

impl TurnTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            latency: TurnLatency::default(),
        }
    }

    /// Record how long a stage took
    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        match stage {
            Stage::Transcription => self.latency.transcription_ms += ms,
            Stage::Generation => self.latency.generation_ms += ms,
            Stage::Synthesis => self.latency.synthesis_ms += ms,
            Stage::Playback => self.latency.playback_ms += ms,
        }
        metrics::histogram!("call_screen_stage_latency_seconds", "stage" => stage.as_str())
            .record(elapsed.as_secs_f64());
    }

    /// Close the turn and record its end-to-end latency
    pub fn finish(mut self) -> TurnLatency {
        let elapsed = self.started.elapsed();
        self.latency.total_ms = elapsed.as_millis() as u64;
        metrics::histogram!("call_screen_turn_latency_seconds").record(elapsed.as_secs_f64());
        self.latency
    }
}

pub(crate) fn record_transcription_failure() {
    metrics::counter!("call_screen_transcription_failures_total").increment(1);
}

pub(crate) fn record_apology() {
    metrics::counter!("call_screen_apologies_total").increment(1);
}

pub(crate) fn record_call_ended(reason: &'static str) {
    metrics::counter!("call_screen_calls_ended_total", "reason" => reason).increment(1);
}
