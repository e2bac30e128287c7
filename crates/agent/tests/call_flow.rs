//! Integration tests for the call orchestration (STT -> dialogue -> TTS -> playback)
//!
//! Every adapter is an in-memory fake, so these tests exercise the state
//! machine, transcript bookkeeping and failure policy end to end.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;

use call_screen_agent::{
    CallAdapters, CallError, CallEvent, CallSession, CallState, SessionInput, Stage, TurnOutcome,
};
use call_screen_config::{OrchestratorSettings, SummaryStrategyKind};
use call_screen_core::{
    AudioSink, AudioSource, CallSummary, DialogueError, EndReason, GenerateRequest,
    GenerateResponse, HandoffError, LanguageModel, PlaybackError, Profile, Speaker,
    SpeechToText, SummaryHandoff, SynthesisError, SynthesizedAudio, TextToSpeech,
    TranscriptionError, TranscriptionResult, TurnKind, VoiceConfig,
};

const JORDAN: &str = "Hi, this is Jordan calling about the marketing proposal.";
const DISCLOSURE: &str =
    "Hi Jordan, I'm Alex's AI assistant. Alex can't take the call right now. What should I pass on?";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Returns queued results, then a fixed fallback
struct ScriptedStt {
    results: Mutex<VecDeque<TranscriptionResult>>,
    fallback: TranscriptionResult,
    calls: Mutex<usize>,
}

impl ScriptedStt {
    fn new(results: Vec<TranscriptionResult>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            fallback: TranscriptionResult::failed(TranscriptionError::EmptyTranscript),
            calls: Mutex::new(0),
        })
    }

    fn always(result: TranscriptionResult) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(VecDeque::new()),
            fallback: result,
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl SpeechToText for ScriptedStt {
    async fn transcribe(&self, _audio: &AudioSource) -> TranscriptionResult {
        *self.calls.lock() += 1;
        self.results
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn model_name(&self) -> &str {
        "scripted-stt"
    }
}

/// Returns queued replies, then a fixed fallback if one is set
struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, DialogueError>>>,
    fallback: Option<String>,
}

impl ScriptedLlm {
    fn new(replies: Vec<Result<String, DialogueError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
        })
    }

    fn always(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply.to_string()),
        })
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, DialogueError> {
        let next = self.replies.lock().pop_front();
        match (next, &self.fallback) {
            (Some(reply), _) => reply.map(GenerateResponse::text),
            (None, Some(fallback)) => Ok(GenerateResponse::text(fallback.clone())),
            (None, None) => Err(DialogueError::Unavailable("script exhausted".into())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted-llm"
    }
}

/// Blocks inside `generate` until released
struct GatedLlm {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl LanguageModel for GatedLlm {
    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, DialogueError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(GenerateResponse::text("This reply arrives too late."))
    }

    fn model_name(&self) -> &str {
        "gated-llm"
    }
}

/// Encodes the text as "audio" and remembers what it was asked to say
struct RecordingTts {
    texts: Mutex<Vec<String>>,
    empty: bool,
}

impl RecordingTts {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            texts: Mutex::new(Vec::new()),
            empty: false,
        })
    }

    /// Misbehaving provider that answers 200 with no body
    fn silent() -> Arc<Self> {
        Arc::new(Self {
            texts: Mutex::new(Vec::new()),
            empty: true,
        })
    }

    fn texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }
}

#[async_trait]
impl TextToSpeech for RecordingTts {
    async fn synthesize(
        &self,
        text: &str,
        _voice: &VoiceConfig,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        self.texts.lock().push(text.to_string());
        let data = if self.empty {
            Vec::new()
        } else {
            text.as_bytes().to_vec()
        };
        Ok(SynthesizedAudio::new(data, "audio/mpeg"))
    }

    fn model_name(&self) -> &str {
        "recording-tts"
    }
}

struct RecordingSink {
    played: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            played: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            played: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    fn count(&self) -> usize {
        self.played.lock().len()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, _session_id: &str, audio: &SynthesizedAudio) -> Result<(), PlaybackError> {
        if self.fail {
            return Err(PlaybackError::ChannelClosed);
        }
        self.played.lock().push(audio.data.clone());
        Ok(())
    }
}

#[derive(Default)]
struct CountingHandoff {
    delivered: Mutex<Vec<CallSummary>>,
}

#[async_trait]
impl SummaryHandoff for CountingHandoff {
    async fn deliver(&self, summary: &CallSummary) -> Result<(), HandoffError> {
        self.delivered.lock().push(summary.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        retry_backoff_ms: 1,
        ..Default::default()
    }
}

fn segment() -> AudioSource {
    AudioSource::url("https://media.example.com/segment.wav")
}

fn adapters(
    stt: Arc<dyn SpeechToText>,
    llm: Arc<dyn LanguageModel>,
    tts: Arc<RecordingTts>,
    sink: Arc<RecordingSink>,
) -> CallAdapters {
    CallAdapters { stt, llm, tts, sink }
}

fn session(id: &str, adapters: CallAdapters, settings: OrchestratorSettings) -> CallSession {
    CallSession::new(id, Arc::new(Profile::new("Alex")), adapters, settings)
        .unwrap()
        .with_summary_strategy(SummaryStrategyKind::Extractive)
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<CallEvent>) -> Vec<CallEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn visited(session: &CallSession, state: CallState) -> bool {
    session.history().iter().any(|t| t.to == state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_single_turn_discloses_and_summarizes() {
    let tts = RecordingTts::new();
    let sink = RecordingSink::new();
    let mut call = session(
        "call-jordan",
        adapters(
            ScriptedStt::new(vec![TranscriptionResult::transcribed(JORDAN, 0.95)]),
            ScriptedLlm::new(vec![Ok(DISCLOSURE.to_string())]),
            tts.clone(),
            sink.clone(),
        ),
        settings(),
    );
    assert_eq!(call.state(), CallState::Idle);

    let outcome = call.process_segment(segment()).await.unwrap();
    let TurnOutcome::Replied {
        caller_text,
        reply,
        audio,
        latency,
    } = outcome
    else {
        panic!("expected a reply, got {:?}", outcome);
    };

    assert_eq!(caller_text, JORDAN);
    assert!(reply.contains("AI assistant"));
    assert_eq!(audio.data, reply.as_bytes());
    assert!(latency.total_ms >= latency.generation_ms);
    assert_eq!(call.state(), CallState::Listening);
    assert_eq!(sink.count(), 1);
    assert_eq!(tts.texts(), vec![reply.clone()]);
    assert_eq!(call.latencies().len(), 1);

    let path: Vec<CallState> = call.history().iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![
            CallState::Listening,
            CallState::Transcribing,
            CallState::Generating,
            CallState::Synthesizing,
            CallState::Speaking,
            CallState::Listening,
        ]
    );

    let turns = call.transcript().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].speaker, Speaker::Caller);
    assert_eq!(turns[0].confidence, Some(0.95));
    assert_eq!(turns[1].speaker, Speaker::Assistant);

    let summary = call.end(EndReason::Hangup).await;
    assert_eq!(summary.caller_name.as_deref(), Some("Jordan"));
    assert_eq!(summary.purpose.as_deref(), Some("marketing proposal"));
    assert_eq!(summary.screened_for, "Alex");
    assert_eq!(summary.end_reason, Some(EndReason::Hangup));
    assert_eq!(summary.turn_count, 2);
    assert_eq!(call.state(), CallState::Ended);
}

#[tokio::test]
async fn test_zero_length_audio_ends_call_without_playback() {
    let sink = RecordingSink::new();
    let mut call = session(
        "call-silent-tts",
        adapters(
            ScriptedStt::new(vec![TranscriptionResult::transcribed(JORDAN, 0.9)]),
            ScriptedLlm::new(vec![Ok(DISCLOSURE.to_string())]),
            RecordingTts::silent(),
            sink.clone(),
        ),
        settings(),
    );
    let mut events = call.subscribe();

    let outcome = call.process_segment(segment()).await.unwrap();
    match outcome {
        TurnOutcome::Ended { reason, summary } => {
            assert!(matches!(reason, EndReason::SynthesisFailure(_)));
            assert_eq!(summary.end_reason, Some(reason));
        }
        other => panic!("expected the call to end, got {:?}", other),
    }

    assert_eq!(sink.count(), 0);
    assert!(call.is_ended());
    assert!(!visited(&call, CallState::Speaking));
    assert_eq!(call.transcript().assistant_utterances(), 0);

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        CallEvent::Failed {
            stage: Stage::Synthesis,
            ..
        }
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, CallEvent::Ended { reason: EndReason::SynthesisFailure(_) })));
}

#[tokio::test]
async fn test_hangup_during_generation_discards_reply() {
    let llm = Arc::new(GatedLlm {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let tts = RecordingTts::new();
    let sink = RecordingSink::new();
    let mut call = session(
        "call-hangup",
        adapters(
            ScriptedStt::new(vec![TranscriptionResult::transcribed(JORDAN, 0.9)]),
            llm.clone(),
            tts.clone(),
            sink.clone(),
        ),
        settings(),
    );
    let handle = call.handle();

    let worker = tokio::spawn(async move {
        let outcome = call.process_segment(segment()).await;
        (call, outcome)
    });

    timeout(Duration::from_secs(2), llm.entered.notified())
        .await
        .expect("generation never started");
    assert_eq!(handle.state(), CallState::Generating);

    assert!(handle.hangup());
    assert_eq!(handle.state(), CallState::Ended);
    assert!(!handle.hangup());
    llm.release.notify_one();

    let (call, outcome) = timeout(Duration::from_secs(2), worker)
        .await
        .expect("worker stuck")
        .unwrap();

    match outcome.unwrap() {
        TurnOutcome::Ended { reason, summary } => {
            assert_eq!(reason, EndReason::Hangup);
            assert_eq!(summary.end_reason, Some(EndReason::Hangup));
        }
        other => panic!("expected the call to end, got {:?}", other),
    }

    assert!(!visited(&call, CallState::Synthesizing));
    assert!(!visited(&call, CallState::Speaking));
    assert!(tts.texts().is_empty());
    assert_eq!(sink.count(), 0);
    assert_eq!(call.transcript().assistant_utterances(), 0);
}

#[tokio::test]
async fn test_consecutive_failures_exhaust_the_call() {
    let stt = ScriptedStt::always(TranscriptionResult::failed(TranscriptionError::Timeout(
        Duration::from_secs(10),
    )));
    let tts = RecordingTts::new();
    let sink = RecordingSink::new();
    let mut call = session(
        "call-noise",
        adapters(stt.clone(), ScriptedLlm::new(vec![]), tts.clone(), sink.clone()),
        settings(),
    );

    for expected in 1..=3u32 {
        let outcome = call.process_segment(segment()).await.unwrap();
        match outcome {
            TurnOutcome::Apologized {
                consecutive_failures,
                error,
                ..
            } => {
                assert_eq!(consecutive_failures, expected);
                assert!(matches!(error, TranscriptionError::Timeout(_)));
            }
            other => panic!("expected an apology, got {:?}", other),
        }
    }

    assert!(call.is_ended());
    assert_eq!(call.end_reason(), Some(EndReason::TranscriptionExhausted));
    // One retry per segment
    assert_eq!(stt.calls(), 6);

    let turns = call.transcript().turns();
    assert_eq!(turns.len(), 3);
    assert!(turns.iter().all(|t| t.kind == TurnKind::Apology));
    assert_eq!(call.transcript().caller_turns().count(), 0);
    assert_eq!(sink.count(), 3);

    assert_eq!(
        call.process_segment(segment()).await.unwrap_err(),
        CallError::CallEnded
    );
    assert_eq!(
        call.summary().and_then(|s| s.end_reason.clone()),
        Some(EndReason::TranscriptionExhausted)
    );
}

#[tokio::test]
async fn test_retry_recovers_within_segment() {
    let stt = ScriptedStt::new(vec![
        TranscriptionResult::failed(TranscriptionError::Unreachable("reset".into())),
        TranscriptionResult::transcribed(JORDAN, 0.9),
    ]);
    let mut call = session(
        "call-retry",
        adapters(
            stt.clone(),
            ScriptedLlm::new(vec![Ok(DISCLOSURE.to_string())]),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        settings(),
    );

    let outcome = call.process_segment(segment()).await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Replied { .. }));
    assert_eq!(stt.calls(), 2);
    assert_eq!(call.consecutive_failures(), 0);
}

#[tokio::test]
async fn test_low_confidence_is_a_failed_segment() {
    let mut call = session(
        "call-mumble",
        adapters(
            ScriptedStt::always(TranscriptionResult::transcribed("mmph", 0.1)),
            ScriptedLlm::new(vec![]),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        settings(),
    );

    let outcome = call.process_segment(segment()).await.unwrap();
    match outcome {
        TurnOutcome::Apologized { apology, error, .. } => {
            assert_eq!(apology, OrchestratorSettings::default().apology_text);
            assert!(matches!(error, TranscriptionError::LowConfidence { .. }));
        }
        other => panic!("expected an apology, got {:?}", other),
    }
    assert_eq!(call.state(), CallState::Listening);
    assert_eq!(call.transcript().caller_turns().count(), 0);
}

#[tokio::test]
async fn test_blank_transcript_is_a_failed_segment() {
    let mut call = session(
        "call-blank",
        adapters(
            ScriptedStt::always(TranscriptionResult::Transcribed {
                text: "   ".to_string(),
                confidence: 0.9,
            }),
            ScriptedLlm::new(vec![]),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        settings(),
    );

    let outcome = call.process_segment(segment()).await.unwrap();
    match outcome {
        TurnOutcome::Apologized { error, .. } => {
            assert_eq!(error, TranscriptionError::EmptyTranscript);
        }
        other => panic!("expected an apology, got {:?}", other),
    }
    assert_eq!(call.transcript().caller_turns().count(), 0);
}

#[tokio::test]
async fn test_success_resets_failure_count() {
    let stt = ScriptedStt::new(vec![
        TranscriptionResult::failed(TranscriptionError::EmptyTranscript),
        TranscriptionResult::failed(TranscriptionError::EmptyTranscript),
        TranscriptionResult::failed(TranscriptionError::EmptyTranscript),
        TranscriptionResult::failed(TranscriptionError::EmptyTranscript),
        TranscriptionResult::transcribed(JORDAN, 0.9),
        TranscriptionResult::failed(TranscriptionError::EmptyTranscript),
        TranscriptionResult::failed(TranscriptionError::EmptyTranscript),
    ]);
    let mut call = session(
        "call-patchy",
        adapters(
            stt,
            ScriptedLlm::always("Got it. Anything else for Alex?"),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        settings(),
    );

    for _ in 0..2 {
        call.process_segment(segment()).await.unwrap();
    }
    assert_eq!(call.consecutive_failures(), 2);

    call.process_segment(segment()).await.unwrap();
    assert_eq!(call.consecutive_failures(), 0);

    let outcome = call.process_segment(segment()).await.unwrap();
    assert!(matches!(
        outcome,
        TurnOutcome::Apologized {
            consecutive_failures: 1,
            ..
        }
    ));
    assert!(!call.is_ended());
}

#[tokio::test]
async fn test_transcript_alternates_across_mixed_turns() {
    let stt = ScriptedStt::new(vec![
        TranscriptionResult::transcribed(JORDAN, 0.9),
        TranscriptionResult::failed(TranscriptionError::EmptyTranscript),
        TranscriptionResult::failed(TranscriptionError::EmptyTranscript),
        TranscriptionResult::transcribed("It's about the budget for next quarter.", 0.8),
        TranscriptionResult::transcribed("Please have Alex call me at 415-555-0134.", 0.85),
    ]);
    let mut call = session(
        "call-mixed",
        adapters(
            stt,
            ScriptedLlm::always("Thanks, I'll let Alex know."),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        settings(),
    );

    for _ in 0..4 {
        call.process_segment(segment()).await.unwrap();
    }

    let transcript = call.transcript();
    assert!(transcript.utterances_alternate());
    assert!(transcript.is_chronological());
    assert_eq!(transcript.caller_turns().count(), 3);
    assert_eq!(transcript.assistant_utterances(), 3);
    assert_eq!(
        transcript
            .turns()
            .iter()
            .filter(|t| t.kind == TurnKind::Apology)
            .count(),
        1
    );

    let summary = call.end(EndReason::Hangup).await;
    assert!(summary.needs_callback());
}

#[tokio::test]
async fn test_dialogue_failure_speaks_notice_and_ends() {
    let tts = RecordingTts::new();
    let sink = RecordingSink::new();
    let mut call = session(
        "call-llm-down",
        adapters(
            ScriptedStt::new(vec![TranscriptionResult::transcribed(JORDAN, 0.9)]),
            ScriptedLlm::new(vec![Err(DialogueError::Timeout(Duration::from_secs(20)))]),
            tts.clone(),
            sink.clone(),
        ),
        settings(),
    );

    let outcome = call.process_segment(segment()).await.unwrap();
    assert!(matches!(
        outcome,
        TurnOutcome::Ended {
            reason: EndReason::DialogueFailure(_),
            ..
        }
    ));

    assert_eq!(tts.texts(), vec![OrchestratorSettings::default().notice_text]);
    assert_eq!(sink.count(), 1);
    let last = call.transcript().last().unwrap();
    assert_eq!(last.kind, TurnKind::Notice);
    assert_eq!(call.transcript().assistant_utterances(), 0);
    assert!(!visited(&call, CallState::Synthesizing));
}

#[tokio::test]
async fn test_playback_failure_ends_call() {
    let mut call = session(
        "call-dropped-line",
        adapters(
            ScriptedStt::new(vec![TranscriptionResult::transcribed(JORDAN, 0.9)]),
            ScriptedLlm::new(vec![Ok(DISCLOSURE.to_string())]),
            RecordingTts::new(),
            RecordingSink::broken(),
        ),
        settings(),
    );

    let outcome = call.process_segment(segment()).await.unwrap();
    assert!(matches!(
        outcome,
        TurnOutcome::Ended {
            reason: EndReason::PlaybackFailure(_),
            ..
        }
    ));
    assert!(call.is_ended());
}

#[tokio::test]
async fn test_farewell_ends_call_after_reply() {
    let sink = RecordingSink::new();
    let mut call = session(
        "call-goodbye",
        adapters(
            ScriptedStt::new(vec![
                TranscriptionResult::transcribed(JORDAN, 0.9),
                TranscriptionResult::transcribed("That's all, thanks. Goodbye!", 0.9),
            ]),
            ScriptedLlm::new(vec![
                Ok(DISCLOSURE.to_string()),
                Ok("Thanks Jordan, I'll pass that along. Goodbye!".to_string()),
            ]),
            RecordingTts::new(),
            sink.clone(),
        ),
        settings(),
    );

    call.process_segment(segment()).await.unwrap();
    assert!(!call.is_ended());

    let outcome = call.process_segment(segment()).await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Replied { .. }));
    assert_eq!(sink.count(), 2);
    assert!(call.is_ended());
    assert_eq!(call.end_reason(), Some(EndReason::CallerFinished));
    assert!(call.summary().is_some());
}

#[tokio::test]
async fn test_max_duration_ends_before_transcribing() {
    let stt = ScriptedStt::new(vec![TranscriptionResult::transcribed(JORDAN, 0.9)]);
    let mut call = session(
        "call-too-long",
        adapters(
            stt.clone(),
            ScriptedLlm::new(vec![]),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        OrchestratorSettings {
            max_call_duration_secs: 0,
            ..settings()
        },
    );

    let outcome = call.process_segment(segment()).await.unwrap();
    assert!(matches!(
        outcome,
        TurnOutcome::Ended {
            reason: EndReason::MaxDuration,
            ..
        }
    ));
    assert_eq!(stt.calls(), 0);
}

#[tokio::test]
async fn test_end_is_idempotent_and_hands_off_once() {
    let handoff = Arc::new(CountingHandoff::default());
    let mut call = session(
        "call-twice",
        adapters(
            ScriptedStt::new(vec![TranscriptionResult::transcribed(JORDAN, 0.9)]),
            ScriptedLlm::new(vec![Ok(DISCLOSURE.to_string())]),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        settings(),
    )
    .with_handoff(handoff.clone());

    call.process_segment(segment()).await.unwrap();

    let first = call.end(EndReason::Hangup).await;
    let second = call.end(EndReason::MaxDuration).await;

    assert_eq!(first, second);
    assert_eq!(second.end_reason, Some(EndReason::Hangup));
    assert_eq!(handoff.delivered.lock().len(), 1);
}

#[tokio::test]
async fn test_generative_summary_falls_back_when_model_fails() {
    // The only scripted reply is used for the turn, so summary generation fails
    let mut call = CallSession::new(
        "call-generative",
        Arc::new(Profile::new("Alex")),
        adapters(
            ScriptedStt::new(vec![TranscriptionResult::transcribed(JORDAN, 0.9)]),
            ScriptedLlm::new(vec![Ok(DISCLOSURE.to_string())]),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        settings(),
    )
    .unwrap();

    call.process_segment(segment()).await.unwrap();
    let summary = call.end(EndReason::Hangup).await;

    assert_eq!(summary.caller_name.as_deref(), Some("Jordan"));
    assert_eq!(summary.purpose.as_deref(), Some("marketing proposal"));
}

#[tokio::test]
async fn test_events_follow_the_turn() {
    let mut call = session(
        "call-events",
        adapters(
            ScriptedStt::new(vec![TranscriptionResult::transcribed(JORDAN, 0.9)]),
            ScriptedLlm::new(vec![Ok(DISCLOSURE.to_string())]),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        settings(),
    );
    let mut rx = call.subscribe();

    call.process_segment(segment()).await.unwrap();
    let events = drain(&mut rx);

    assert!(matches!(
        events.first(),
        Some(CallEvent::StateChanged {
            from: CallState::Idle,
            to: CallState::Listening
        })
    ));
    let caller = events
        .iter()
        .position(|e| matches!(e, CallEvent::CallerTurn { .. }))
        .unwrap();
    let assistant = events
        .iter()
        .position(|e| matches!(e, CallEvent::AssistantTurn { kind: TurnKind::Utterance, .. }))
        .unwrap();
    assert!(caller < assistant);
    assert!(matches!(events.last(), Some(CallEvent::TurnCompleted(_))));
}

#[tokio::test]
async fn test_run_loop_stops_on_hangup() {
    let call = session(
        "call-run",
        adapters(
            ScriptedStt::new(vec![TranscriptionResult::transcribed(JORDAN, 0.9)]),
            ScriptedLlm::new(vec![Ok(DISCLOSURE.to_string())]),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        settings(),
    );
    let handle = call.handle();
    let mut events = handle.subscribe();
    let (tx, rx) = mpsc::channel(8);

    let worker = tokio::spawn(call.run(rx));
    tx.send(SessionInput::Segment(segment())).await.unwrap();

    timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(CallEvent::TurnCompleted(_)) = events.recv().await {
                break;
            }
        }
    })
    .await
    .expect("turn never completed");

    assert!(handle.hangup());
    let summary = timeout(Duration::from_secs(2), worker)
        .await
        .expect("run loop did not stop")
        .unwrap();

    assert_eq!(summary.session_id, "call-run");
    assert_eq!(summary.end_reason, Some(EndReason::Hangup));
    assert_eq!(summary.turn_count, 2);
}

#[tokio::test]
async fn test_run_loop_stops_when_input_closes() {
    let call = session(
        "call-closed",
        adapters(
            ScriptedStt::new(vec![]),
            ScriptedLlm::new(vec![]),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        settings(),
    );
    let (tx, rx) = mpsc::channel::<SessionInput>(1);
    drop(tx);

    let summary = timeout(Duration::from_secs(2), call.run(rx))
        .await
        .expect("run loop did not stop");
    assert_eq!(summary.end_reason, Some(EndReason::Hangup));
    assert_eq!(summary.turn_count, 0);
}

#[tokio::test]
async fn test_parallel_calls_are_independent() {
    let stt = ScriptedStt::always(TranscriptionResult::transcribed(JORDAN, 0.9));
    let llm = ScriptedLlm::always(DISCLOSURE);
    let sink = RecordingSink::new();

    let mut calls: Vec<CallSession> = (0..5)
        .map(|i| {
            session(
                &format!("call-{}", i),
                adapters(stt.clone(), llm.clone(), RecordingTts::new(), sink.clone()),
                settings(),
            )
        })
        .collect();

    let outcomes =
        futures::future::join_all(calls.iter_mut().map(|c| c.process_segment(segment()))).await;

    assert!(outcomes
        .iter()
        .all(|o| matches!(o, Ok(TurnOutcome::Replied { .. }))));
    assert_eq!(sink.count(), 5);
    for call in &calls {
        assert_eq!(call.transcript().len(), 2);
        assert_eq!(call.state(), CallState::Listening);
    }

    calls[0].handle().hangup();
    assert!(calls[0].is_ended());
    assert!(calls[1..].iter().all(|c| !c.is_ended()));
}

#[test]
fn test_invalid_profile_rejected() {
    let result = CallSession::new(
        "call-nameless",
        Arc::new(Profile::new("  ")),
        adapters(
            ScriptedStt::new(vec![]),
            ScriptedLlm::new(vec![]),
            RecordingTts::new(),
            RecordingSink::new(),
        ),
        settings(),
    );
    assert!(matches!(result, Err(CallError::InvalidProfile(_))));
}
