//! Conversation orchestrator
//!
//! Drives one call through the pipeline:
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Caller audio│────▶│     STT     │────▶│  Dialogue   │────▶│     TTS     │
//! │  (segment)  │     │ (+ retries) │     │   engine    │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!       ▲                                                            │
//!       └──────────────────── AudioSink playback ◀───────────────────┘
//! ```
//!
//! Each call has exactly one worker (the owner of [`CallSession`]). Hangup
//! goes through a [`CallHandle`], which only shares the state cell, so it
//! never waits on the worker. A stage result that arrives after the call has
//! ended is discarded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::{broadcast, mpsc, Notify};

use call_screen_config::constants::models;
use call_screen_config::{OrchestratorSettings, SummaryStrategyKind};
use call_screen_core::{
    AudioSink, AudioSource, CallSummary, EndReason, LanguageModel, PlaybackError, Profile,
    SpeechToText, SummaryHandoff, SynthesisError, SynthesizedAudio, TextToSpeech, Transcript,
    TranscriptionError, TranscriptionResult, TurnKind, VoiceConfig,
};

use crate::dialogue::DialogueEngine;
use crate::latency::{self, Stage, TurnLatency, TurnTimer};
use crate::state::{CallState, CallStateMachine, StateTransition};
use crate::CallError;

static FAREWELL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:good ?bye|bye(?: bye)?|see you|talk (?:to you )?later|take care)\b",
        r"(?i)\b(?:that's|that is|that'll be) (?:all|everything)\b",
        r"(?i)\bnothing else\b",
        r"(?i)\bhave a (?:good|great|nice) (?:day|one|evening|night|weekend)\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Whether the caller is wrapping up the call
pub fn is_end_intent(text: &str) -> bool {
    FAREWELL_PATTERNS.iter().any(|p| p.is_match(text))
}

/// External capabilities used by one call
#[derive(Clone)]
pub struct CallAdapters {
    pub stt: Arc<dyn SpeechToText>,
    pub llm: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn TextToSpeech>,
    /// Caller channel
    pub sink: Arc<dyn AudioSink>,
}

/// Call events broadcast to subscribers
#[derive(Debug, Clone)]
pub enum CallEvent {
    StateChanged { from: CallState, to: CallState },
    CallerTurn { text: String, confidence: f32 },
    AssistantTurn { text: String, kind: TurnKind },
    TranscriptionFailed { error: TranscriptionError, consecutive: u32 },
    /// A stage failed and the call is ending
    Failed { stage: Stage, error: String },
    TurnCompleted(TurnLatency),
    Ended { reason: EndReason },
    Summarized(Box<CallSummary>),
}

/// Input for a running call
#[derive(Debug, Clone)]
pub enum SessionInput {
    /// One complete caller utterance
    Segment(AudioSource),
    Hangup,
}

/// Result of processing one caller segment
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The reply was spoken. The call may have ended afterwards when the
    /// caller said goodbye.
    Replied {
        caller_text: String,
        reply: String,
        audio: SynthesizedAudio,
        latency: TurnLatency,
    },
    /// The segment could not be transcribed and the apology was spoken. The
    /// call ends once too many segments in a row fail.
    Apologized {
        apology: String,
        audio: SynthesizedAudio,
        error: TranscriptionError,
        consecutive_failures: u32,
    },
    /// The call ended during this segment; nothing more was spoken
    Ended {
        reason: EndReason,
        summary: CallSummary,
    },
}

/// State shared between the worker and its handles
struct SharedCall {
    session_id: String,
    machine: Mutex<CallStateMachine>,
    events: broadcast::Sender<CallEvent>,
    hangup: Notify,
}

impl SharedCall {
    fn emit(&self, event: CallEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn state(&self) -> CallState {
        self.machine.lock().current()
    }

    fn is_ended(&self) -> bool {
        self.machine.lock().is_ended()
    }

    fn end_reason(&self) -> Option<EndReason> {
        self.machine.lock().end_reason().cloned()
    }

    /// Move to `to` unless the call has already ended
    ///
    /// Returns `Ok(false)` when the call has ended and the caller should
    /// discard whatever it was doing.
    fn advance(&self, to: CallState) -> Result<bool, CallError> {
        let transition = {
            let mut machine = self.machine.lock();
            if machine.is_ended() {
                return Ok(false);
            }
            machine.transition(to)?
        };
        self.announce(&transition);
        Ok(true)
    }

    /// End the call; false when it had already ended
    fn end(&self, reason: EndReason) -> bool {
        let transition = self.machine.lock().end(reason.clone());
        match transition {
            Some(transition) => {
                tracing::info!(
                    session_id = %self.session_id,
                    from = %transition.from,
                    reason = %reason,
                    "Call ended"
                );
                self.announce(&transition);
                self.emit(CallEvent::Ended { reason });
                true
            }
            None => false,
        }
    }

    fn announce(&self, transition: &StateTransition) {
        tracing::debug!(
            session_id = %self.session_id,
            from = %transition.from,
            to = %transition.to,
            "Call state changed"
        );
        self.emit(CallEvent::StateChanged {
            from: transition.from,
            to: transition.to,
        });
    }
}

/// Cloneable control handle for a call
#[derive(Clone)]
pub struct CallHandle {
    shared: Arc<SharedCall>,
}

impl CallHandle {
    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn state(&self) -> CallState {
        self.shared.state()
    }

    pub fn is_ended(&self) -> bool {
        self.shared.is_ended()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.shared.events.subscribe()
    }

    /// End the call now, from any state
    ///
    /// An adapter call already in flight completes, but its result is
    /// discarded by the worker. Returns false if the call had already ended.
    pub fn hangup(&self) -> bool {
        let ended = self.shared.end(EndReason::Hangup);
        self.shared.hangup.notify_one();
        ended
    }
}

/// One phone call: state machine, dialogue engine and adapters
pub struct CallSession {
    shared: Arc<SharedCall>,
    engine: DialogueEngine,
    adapters: CallAdapters,
    settings: OrchestratorSettings,
    voice: VoiceConfig,
    handoff: Option<Arc<dyn SummaryHandoff>>,
    consecutive_failures: u32,
    latencies: Vec<TurnLatency>,
    summary: Option<CallSummary>,
    started: Instant,
    created_at: DateTime<Utc>,
}

impl CallSession {
    pub fn new(
        session_id: impl Into<String>,
        profile: Arc<Profile>,
        adapters: CallAdapters,
        settings: OrchestratorSettings,
    ) -> Result<Self, CallError> {
        profile.validate()?;

        let session_id = session_id.into();
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        let voice = VoiceConfig::new(
            profile
                .voice_id
                .clone()
                .unwrap_or_else(|| models::ELEVENLABS_VOICE.to_string()),
        );
        let engine = DialogueEngine::new(session_id.clone(), profile, adapters.llm.clone());

        tracing::info!(session_id = %session_id, "Call session created");

        Ok(Self {
            shared: Arc::new(SharedCall {
                session_id,
                machine: Mutex::new(CallStateMachine::new()),
                events,
                hangup: Notify::new(),
            }),
            engine,
            adapters,
            settings,
            voice,
            handoff: None,
            consecutive_failures: 0,
            latencies: Vec::new(),
            summary: None,
            started: Instant::now(),
            created_at: Utc::now(),
        })
    }

    pub fn with_summary_strategy(mut self, strategy: SummaryStrategyKind) -> Self {
        self.engine = self.engine.with_summary_strategy(strategy);
        self
    }

    pub fn with_handoff(mut self, handoff: Arc<dyn SummaryHandoff>) -> Self {
        self.handoff = Some(handoff);
        self
    }

    pub fn with_voice(mut self, voice: VoiceConfig) -> Self {
        self.voice = voice;
        self
    }

    /// Voice to use when the profile doesn't name one
    pub fn with_default_voice(mut self, voice_id: impl Into<String>) -> Self {
        if self.engine.profile().voice_id.is_none() {
            self.voice = VoiceConfig::new(voice_id);
        }
        self
    }

    pub fn handle(&self) -> CallHandle {
        CallHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.shared.events.subscribe()
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn profile(&self) -> &Profile {
        self.engine.profile()
    }

    pub fn state(&self) -> CallState {
        self.shared.state()
    }

    pub fn is_ended(&self) -> bool {
        self.shared.is_ended()
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.shared.end_reason()
    }

    pub fn history(&self) -> Vec<StateTransition> {
        self.shared.machine.lock().history().to_vec()
    }

    pub fn transcript(&self) -> &Transcript {
        self.engine.transcript()
    }

    pub fn latencies(&self) -> &[TurnLatency] {
        &self.latencies
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Summary, once the call has ended and been summarized
    pub fn summary(&self) -> Option<&CallSummary> {
        self.summary.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Run one full turn for a caller segment
    pub async fn process_segment(&mut self, audio: AudioSource) -> Result<TurnOutcome, CallError> {
        if self.is_ended() {
            return Err(CallError::CallEnded);
        }

        if self.elapsed() >= Duration::from_secs(self.settings.max_call_duration_secs) {
            tracing::info!(
                session_id = %self.session_id(),
                limit_secs = self.settings.max_call_duration_secs,
                "Maximum call duration reached"
            );
            return Ok(self.finish(EndReason::MaxDuration).await);
        }

        if self.state() == CallState::Idle && !self.shared.advance(CallState::Listening)? {
            return Ok(self.discard().await);
        }

        let mut timer = TurnTimer::start();
        if !self.shared.advance(CallState::Transcribing)? {
            return Ok(self.discard().await);
        }

        let stage_start = Instant::now();
        let transcription = self.transcribe_with_retries(&audio).await;
        timer.record(Stage::Transcription, stage_start.elapsed());
        if self.is_ended() {
            return Ok(self.discard().await);
        }

        let (caller_text, confidence) = match transcription {
            Ok(transcribed) => transcribed,
            Err(error) => return self.handle_transcription_failure(error).await,
        };
        self.consecutive_failures = 0;

        if !self.shared.advance(CallState::Generating)? {
            return Ok(self.discard().await);
        }
        self.engine.record_caller(&caller_text, Some(confidence));
        self.shared.emit(CallEvent::CallerTurn {
            text: caller_text.clone(),
            confidence,
        });

        let stage_start = Instant::now();
        let generated = self.engine.generate_reply().await;
        timer.record(Stage::Generation, stage_start.elapsed());
        if self.is_ended() {
            return Ok(self.discard().await);
        }

        let reply = match generated {
            Ok(reply) => reply,
            Err(error) => {
                tracing::error!(
                    session_id = %self.session_id(),
                    error = %error,
                    "Reply generation failed"
                );
                self.shared.emit(CallEvent::Failed {
                    stage: Stage::Generation,
                    error: error.to_string(),
                });
                self.speak_notice().await;
                return Ok(self.finish(EndReason::DialogueFailure(error.to_string())).await);
            }
        };

        if !self.shared.advance(CallState::Synthesizing)? {
            return Ok(self.discard().await);
        }

        let stage_start = Instant::now();
        let synthesized = self.adapters.tts.synthesize(&reply, &self.voice).await;
        timer.record(Stage::Synthesis, stage_start.elapsed());
        if self.is_ended() {
            return Ok(self.discard().await);
        }

        let audio = match synthesized.and_then(require_audio) {
            Ok(audio) => audio,
            Err(error) => return Ok(self.handle_synthesis_failure(error).await),
        };

        self.engine.record_assistant(&reply);
        self.shared.emit(CallEvent::AssistantTurn {
            text: reply.clone(),
            kind: TurnKind::Utterance,
        });

        if !self.shared.advance(CallState::Speaking)? {
            return Ok(self.discard().await);
        }

        let stage_start = Instant::now();
        let played = self.adapters.sink.play(&self.shared.session_id, &audio).await;
        timer.record(Stage::Playback, stage_start.elapsed());
        if let Err(error) = played {
            return Ok(self.handle_playback_failure(error).await);
        }

        if !self.shared.advance(CallState::Listening)? {
            return Ok(self.discard().await);
        }

        let latency = timer.finish();
        self.latencies.push(latency);
        self.shared.emit(CallEvent::TurnCompleted(latency));
        tracing::info!(
            session_id = %self.session_id(),
            transcription_ms = latency.transcription_ms,
            generation_ms = latency.generation_ms,
            synthesis_ms = latency.synthesis_ms,
            total_ms = latency.total_ms,
            "Turn completed"
        );

        if is_end_intent(&caller_text) {
            tracing::info!(session_id = %self.session_id(), "Caller is wrapping up");
            self.end(EndReason::CallerFinished).await;
        }

        Ok(TurnOutcome::Replied {
            caller_text,
            reply,
            audio,
            latency,
        })
    }

    /// Process inputs until the call ends, then summarize it
    pub async fn run(mut self, mut input: mpsc::Receiver<SessionInput>) -> CallSummary {
        let shared = self.shared.clone();

        loop {
            if self.is_ended() {
                break;
            }

            tokio::select! {
                message = input.recv() => match message {
                    Some(SessionInput::Segment(audio)) => {
                        if let Err(e) = self.process_segment(audio).await {
                            tracing::warn!(
                                session_id = %self.session_id(),
                                error = %e,
                                "Segment rejected"
                            );
                        }
                    }
                    Some(SessionInput::Hangup) | None => break,
                },
                _ = shared.hangup.notified() => break,
            }
        }

        self.end(EndReason::Hangup).await
    }

    /// End the call and produce its summary
    ///
    /// Idempotent: the summary is built and handed off once, and later calls
    /// return the same summary. If the call had already ended the original
    /// reason is kept.
    pub async fn end(&mut self, reason: EndReason) -> CallSummary {
        self.shared.end(reason.clone());

        if let Some(summary) = &self.summary {
            return summary.clone();
        }

        let reason = self.end_reason().unwrap_or(reason);
        latency::record_call_ended(reason.label());

        let mut summary = self.engine.summarize().await;
        summary.end_reason = Some(reason);
        summary.duration_secs = self.elapsed().as_secs();

        if let Some(handoff) = &self.handoff {
            if let Err(e) = handoff.deliver(&summary).await {
                tracing::warn!(
                    session_id = %self.session_id(),
                    handoff = handoff.name(),
                    error = %e,
                    "Summary handoff failed"
                );
            }
        }

        tracing::info!(
            session_id = %self.session_id(),
            turns = summary.turn_count,
            duration_secs = summary.duration_secs,
            "{}",
            summary.headline()
        );

        self.shared
            .emit(CallEvent::Summarized(Box::new(summary.clone())));
        self.summary = Some(summary.clone());
        summary
    }

    async fn finish(&mut self, reason: EndReason) -> TurnOutcome {
        let summary = self.end(reason.clone()).await;
        TurnOutcome::Ended {
            reason: summary.end_reason.clone().unwrap_or(reason),
            summary,
        }
    }

    /// The call ended while a stage was in flight
    async fn discard(&mut self) -> TurnOutcome {
        tracing::info!(
            session_id = %self.session_id(),
            "Call ended mid-turn, discarding stage result"
        );
        self.finish(EndReason::Hangup).await
    }

    async fn transcribe_with_retries(
        &self,
        audio: &AudioSource,
    ) -> Result<(String, f32), TranscriptionError> {
        let attempts = self.settings.transcription_retries + 1;
        let mut backoff = Duration::from_millis(self.settings.retry_backoff_ms);
        let mut last_error = TranscriptionError::EmptyTranscript;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
                if self.is_ended() {
                    break;
                }
            }

            last_error = match self.adapters.stt.transcribe(audio).await {
                TranscriptionResult::Transcribed { text, .. } if text.trim().is_empty() => {
                    TranscriptionError::EmptyTranscript
                }
                TranscriptionResult::Transcribed { text, confidence }
                    if confidence >= self.settings.min_confidence =>
                {
                    return Ok((text.trim().to_string(), confidence));
                }
                TranscriptionResult::Transcribed { confidence, .. } => {
                    TranscriptionError::LowConfidence {
                        confidence,
                        threshold: self.settings.min_confidence,
                    }
                }
                TranscriptionResult::Failed(error) => error,
            };

            tracing::debug!(
                session_id = %self.session_id(),
                attempt,
                attempts,
                error = %last_error,
                "Transcription attempt failed"
            );
        }

        Err(last_error)
    }

    async fn handle_transcription_failure(
        &mut self,
        error: TranscriptionError,
    ) -> Result<TurnOutcome, CallError> {
        self.consecutive_failures += 1;
        latency::record_transcription_failure();
        tracing::warn!(
            session_id = %self.session_id(),
            error = %error,
            consecutive = self.consecutive_failures,
            "Could not transcribe caller segment"
        );
        self.shared.emit(CallEvent::TranscriptionFailed {
            error: error.clone(),
            consecutive: self.consecutive_failures,
        });

        let apology = self.settings.apology_text.clone();
        let audio = match self.speak(&apology, TurnKind::Apology).await {
            Ok(audio) => audio,
            Err(SpeakFailure::Ended) => return Ok(self.discard().await),
            Err(SpeakFailure::Synthesis(e)) => return Ok(self.handle_synthesis_failure(e).await),
            Err(SpeakFailure::Playback(e)) => return Ok(self.handle_playback_failure(e).await),
        };
        latency::record_apology();

        if !self.shared.advance(CallState::Listening)? {
            return Ok(self.discard().await);
        }

        if self.consecutive_failures >= self.settings.max_consecutive_apologies {
            tracing::warn!(
                session_id = %self.session_id(),
                failures = self.consecutive_failures,
                "Too many unintelligible segments, ending call"
            );
            self.end(EndReason::TranscriptionExhausted).await;
        }

        Ok(TurnOutcome::Apologized {
            apology,
            audio,
            error,
            consecutive_failures: self.consecutive_failures,
        })
    }

    async fn handle_synthesis_failure(&mut self, error: SynthesisError) -> TurnOutcome {
        tracing::error!(
            session_id = %self.session_id(),
            error = %error,
            "Speech synthesis failed"
        );
        self.shared.emit(CallEvent::Failed {
            stage: Stage::Synthesis,
            error: error.to_string(),
        });
        self.finish(EndReason::SynthesisFailure(error.to_string())).await
    }

    async fn handle_playback_failure(&mut self, error: PlaybackError) -> TurnOutcome {
        tracing::error!(
            session_id = %self.session_id(),
            error = %error,
            "Audio playback failed"
        );
        self.shared.emit(CallEvent::Failed {
            stage: Stage::Playback,
            error: error.to_string(),
        });
        self.finish(EndReason::PlaybackFailure(error.to_string())).await
    }

    /// Best-effort generic notice before a failed call ends
    async fn speak_notice(&mut self) {
        let notice = self.settings.notice_text.clone();
        if notice.trim().is_empty() {
            return;
        }
        if let Err(e) = self.speak(&notice, TurnKind::Notice).await {
            tracing::warn!(
                session_id = %self.session_id(),
                error = ?e,
                "Could not speak failure notice"
            );
        }
    }

    /// Synthesize, record and play a fixed assistant line
    async fn speak(&mut self, text: &str, kind: TurnKind) -> Result<SynthesizedAudio, SpeakFailure> {
        let audio = self
            .adapters
            .tts
            .synthesize(text, &self.voice)
            .await
            .and_then(require_audio)
            .map_err(SpeakFailure::Synthesis)?;

        if self.is_ended() {
            return Err(SpeakFailure::Ended);
        }

        match kind {
            TurnKind::Apology => self.engine.record_apology(text),
            TurnKind::Notice => self.engine.record_notice(text),
            TurnKind::Utterance => self.engine.record_assistant(text),
        };
        self.shared.emit(CallEvent::AssistantTurn {
            text: text.to_string(),
            kind,
        });

        self.adapters
            .sink
            .play(&self.shared.session_id, &audio)
            .await
            .map_err(SpeakFailure::Playback)?;

        Ok(audio)
    }
}

#[derive(Debug)]
enum SpeakFailure {
    Ended,
    Synthesis(SynthesisError),
    Playback(PlaybackError),
}

fn require_audio(audio: SynthesizedAudio) -> Result<SynthesizedAudio, SynthesisError> {
    if audio.is_empty() {
        Err(SynthesisError::EmptyAudio)
    } else {
        Ok(audio)
    }
}
