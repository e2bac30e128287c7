//! Application State
//!
//! Shared state across all handlers.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::Mutex;

use call_screen_agent::{
    create_handoff, CallAdapters, CallHandle, CallSession, CallState, TurnLatency,
};
use call_screen_config::Settings;
use call_screen_core::{
    AudioSink, CallSummary, EndReason, PlaybackError, Profile, SummaryHandoff, SynthesizedAudio,
    Turn,
};
use call_screen_llm::LlmFactory;
use call_screen_pipeline::{create_stt, create_tts};

use crate::ServerError;

/// Audio is returned in the HTTP response, so playback only records that the
/// reply is ready for the telephony side to fetch.
pub struct ResponseSink;

#[async_trait]
impl AudioSink for ResponseSink {
    async fn play(&self, session_id: &str, audio: &SynthesizedAudio) -> Result<(), PlaybackError> {
        tracing::debug!(
            session_id = %session_id,
            bytes = audio.len(),
            content_type = %audio.content_type,
            "Reply audio ready"
        );
        Ok(())
    }
}

/// One registered call
#[derive(Clone)]
pub struct CallEntry {
    /// The worker; holding the lock means running the call
    pub session: Arc<Mutex<CallSession>>,
    /// Hangup and state without waiting on the worker
    pub handle: CallHandle,
}

/// Snapshot of a call, served by `GET /api/calls/:id`
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub session_id: String,
    pub state: CallState,
    pub screened_for: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
    pub transcript: Vec<Turn>,
    pub latencies: Vec<TurnLatency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<CallSummary>,
    pub created_at: String,
    pub elapsed_secs: u64,
}

impl CallRecord {
    pub fn from_session(session: &CallSession) -> Self {
        Self {
            session_id: session.session_id().to_string(),
            state: session.state(),
            screened_for: session.profile().name.clone(),
            end_reason: session.end_reason(),
            transcript: session.transcript().turns().to_vec(),
            latencies: session.latencies().to_vec(),
            summary: session.summary().cloned(),
            created_at: session.created_at().to_rfc3339(),
            elapsed_secs: session.elapsed().as_secs(),
        }
    }
}

/// Application state
///
/// Live calls sit in `calls`; once a call ends its session is dropped and
/// only the final record stays, oldest first out past `retained_calls`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    adapters: CallAdapters,
    handoff: Arc<dyn SummaryHandoff>,
    calls: Arc<DashMap<String, CallEntry>>,
    ended: Arc<parking_lot::Mutex<VecDeque<CallRecord>>>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Settings, adapters: CallAdapters, handoff: Arc<dyn SummaryHandoff>) -> Self {
        Self {
            config: Arc::new(config),
            adapters,
            handoff,
            calls: Arc::new(DashMap::new()),
            ended: Arc::new(parking_lot::Mutex::new(VecDeque::new())),
            metrics: None,
        }
    }

    /// Build every adapter from settings
    pub fn from_settings(config: Settings) -> Result<Self, ServerError> {
        let adapters = CallAdapters {
            stt: create_stt(&config.stt).map_err(|e| ServerError::Internal(e.to_string()))?,
            llm: LlmFactory::create(&config.llm).map_err(|e| ServerError::Internal(e.to_string()))?,
            tts: create_tts(&config.tts).map_err(|e| ServerError::Internal(e.to_string()))?,
            sink: Arc::new(ResponseSink),
        };
        let handoff = create_handoff(&config.handoff)?;

        Ok(Self::new(config, adapters, handoff))
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn metrics(&self) -> Option<&PrometheusHandle> {
        self.metrics.as_ref()
    }

    /// Register a new call, using the configured persona unless one is given
    pub fn create_call(&self, profile: Option<Profile>) -> Result<String, ServerError> {
        let limit = self.config.server.max_sessions;
        if self.active_calls() >= limit {
            return Err(ServerError::Capacity(limit));
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let profile = Arc::new(profile.unwrap_or_else(|| self.config.profile.clone()));

        let session = CallSession::new(
            session_id.clone(),
            profile,
            self.adapters.clone(),
            self.config.orchestrator.clone(),
        )?
        .with_summary_strategy(self.config.summary.strategy)
        .with_default_voice(self.config.tts.default_voice_id.clone())
        .with_handoff(self.handoff.clone());

        let handle = session.handle();
        self.calls.insert(
            session_id.clone(),
            CallEntry {
                session: Arc::new(Mutex::new(session)),
                handle,
            },
        );
        self.record_active();

        tracing::info!(session_id = %session_id, "Call registered");
        Ok(session_id)
    }

    /// A live call; `CallEnded` once it has been retired
    pub fn get(&self, session_id: &str) -> Result<CallEntry, ServerError> {
        if let Some(entry) = self.calls.get(session_id) {
            return Ok(entry.value().clone());
        }
        if self.ended_record(session_id).is_some() {
            return Err(ServerError::CallEnded);
        }
        Err(ServerError::NotFound(session_id.to_string()))
    }

    pub fn ended_record(&self, session_id: &str) -> Option<CallRecord> {
        self.ended
            .lock()
            .iter()
            .find(|record| record.session_id == session_id)
            .cloned()
    }

    /// Drop an ended call from the live set, keeping its final record
    ///
    /// Builds the summary first if the call was hung up between turns.
    /// Does nothing while the call is still running.
    pub async fn retire(&self, session: &mut CallSession) -> Option<CallSummary> {
        if !session.is_ended() {
            return None;
        }
        let summary = session.end(EndReason::Hangup).await;
        let session_id = session.session_id().to_string();

        if self.calls.remove(&session_id).is_some() {
            let mut ended = self.ended.lock();
            ended.push_back(CallRecord::from_session(session));
            while ended.len() > self.config.server.retained_calls {
                ended.pop_front();
            }
            tracing::debug!(
                session_id = %session_id,
                retained = ended.len(),
                "Call retired"
            );
        }
        self.record_active();

        Some(summary)
    }

    /// Calls still held in the live set
    pub fn live_calls(&self) -> usize {
        self.calls.len()
    }

    pub fn retained_calls(&self) -> usize {
        self.ended.lock().len()
    }

    /// Calls that have not ended yet
    pub fn active_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|entry| !entry.handle.is_ended())
            .count()
    }

    pub fn record_active(&self) {
        metrics::gauge!("call_screen_active_calls").set(self.active_calls() as f64);
    }
}
