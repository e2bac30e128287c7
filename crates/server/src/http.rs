//! HTTP Endpoints
//!
//! REST API for call sessions.

use std::time::Duration;

use axum::{
    extract::{Json, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use call_screen_agent::{CallSession, CallState, TurnLatency, TurnOutcome};
use call_screen_core::{AudioSource, CallSummary, EndReason, Profile};

use crate::state::{AppState, CallRecord};
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.config.server.cors_origins,
        state.config.server.cors_enabled,
    );
    let timeout = Duration::from_secs(state.config.server.timeout_seconds);

    Router::new()
        .route("/api/calls", post(create_call))
        .route("/api/calls/:id", get(get_call))
        .route("/api/calls/:id/segments", post(submit_segment))
        .route("/api/calls/:id/hangup", post(hangup))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer)
        .with_state(state)
}

/// - disabled: no cross-origin access
/// - enabled without origins: any origin
/// - otherwise the configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        return CorsLayer::new();
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    layer.allow_origin(parsed_origins)
}

/// Create call request
#[derive(Debug, Default, Deserialize)]
struct CreateCallRequest {
    /// Overrides the configured persona
    #[serde(default)]
    profile: Option<Profile>,
}

#[derive(Debug, Serialize)]
struct CreateCallResponse {
    session_id: String,
    state: CallState,
}

async fn create_call(
    State(state): State<AppState>,
    request: Option<Json<CreateCallRequest>>,
) -> Result<(StatusCode, Json<CreateCallResponse>), ServerError> {
    let Json(request) = request.unwrap_or_default();
    let session_id = state.create_call(request.profile)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateCallResponse {
            session_id,
            state: CallState::Idle,
        }),
    ))
}

/// One caller segment, by URL or inline
#[derive(Debug, Deserialize)]
struct SegmentRequest {
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default)]
    audio_base64: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

impl SegmentRequest {
    fn into_source(self) -> Result<AudioSource, ServerError> {
        match (self.audio_url, self.audio_base64) {
            (Some(url), None) if !url.trim().is_empty() => Ok(AudioSource::url(url)),
            (None, Some(encoded)) => {
                let data = BASE64
                    .decode(encoded.trim())
                    .map_err(|e| ServerError::InvalidRequest(format!("audio_base64: {}", e)))?;
                if data.is_empty() {
                    return Err(ServerError::InvalidRequest("audio_base64 is empty".into()));
                }
                let mime_type = self.mime_type.unwrap_or_else(|| "audio/wav".to_string());
                Ok(AudioSource::bytes(data, mime_type))
            }
            _ => Err(ServerError::InvalidRequest(
                "exactly one of audio_url or audio_base64 is required".into(),
            )),
        }
    }
}

/// Result of one turn
#[derive(Debug, Default, Serialize)]
struct SegmentResponse {
    session_id: String,
    /// "replied", "apologized" or "ended"
    outcome: &'static str,
    state: Option<CallState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    caller_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency: Option<TurnLatency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    consecutive_failures: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_reason: Option<EndReason>,
    /// Present once the call has ended, including after a farewell reply
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<CallSummary>,
}

impl SegmentResponse {
    fn new(session_id: &str, outcome: TurnOutcome, session: &CallSession) -> Self {
        let mut response = SegmentResponse {
            session_id: session_id.to_string(),
            ..Default::default()
        };
        match outcome {
            TurnOutcome::Replied {
                caller_text,
                reply,
                audio,
                latency,
            } => {
                response.outcome = "replied";
                response.caller_text = Some(caller_text);
                response.reply = Some(reply);
                response.audio_base64 = Some(BASE64.encode(&audio.data));
                response.content_type = Some(audio.content_type);
                response.latency = Some(latency);
            }
            TurnOutcome::Apologized {
                apology,
                audio,
                error,
                consecutive_failures,
            } => {
                response.outcome = "apologized";
                response.reply = Some(apology);
                response.audio_base64 = Some(BASE64.encode(&audio.data));
                response.content_type = Some(audio.content_type);
                response.error = Some(error.to_string());
                response.consecutive_failures = Some(consecutive_failures);
            }
            TurnOutcome::Ended { reason, summary } => {
                response.outcome = "ended";
                response.end_reason = Some(reason);
                response.summary = Some(summary);
            }
        }

        response.state = Some(session.state());
        if response.summary.is_none() {
            response.summary = session.summary().cloned();
            response.end_reason = session.end_reason();
        }
        response
    }
}

/// Run one turn
///
/// The turn runs in its own task that owns the session lock, so a request
/// timeout or a dropped connection cannot stop it between stages.
async fn submit_segment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SegmentRequest>,
) -> Result<Json<SegmentResponse>, ServerError> {
    let audio = request.into_source()?;
    let entry = state.get(&id)?;
    if entry.handle.is_ended() {
        return Err(ServerError::CallEnded);
    }

    let worker = tokio::spawn(async move {
        let mut session = entry.session.lock_owned().await;
        let outcome = session.process_segment(audio).await;
        let response = outcome.map(|outcome| SegmentResponse::new(&id, outcome, &session));
        state.retire(&mut session).await;
        response
    });

    let response = worker
        .await
        .map_err(|e| ServerError::Internal(format!("turn worker failed: {}", e)))??;
    Ok(Json(response))
}

/// Hang up and return the summary
///
/// The handle ends the call at once, even while a turn is running; the
/// summary is built once the worker has let go of the session.
async fn hangup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CallSummary>, ServerError> {
    let entry = match state.get(&id) {
        Ok(entry) => entry,
        Err(ServerError::CallEnded) => {
            return state
                .ended_record(&id)
                .and_then(|record| record.summary)
                .map(Json)
                .ok_or(ServerError::CallEnded);
        }
        Err(e) => return Err(e),
    };
    if entry.handle.hangup() {
        tracing::info!(session_id = %id, "Caller hung up");
    }

    let worker = tokio::spawn(async move {
        let mut session = entry.session.lock_owned().await;
        let summary = session.end(EndReason::Hangup).await;
        state.retire(&mut session).await;
        summary
    });

    let summary = worker
        .await
        .map_err(|e| ServerError::Internal(format!("hangup worker failed: {}", e)))?;
    Ok(Json(summary))
}

async fn get_call(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CallRecord>, ServerError> {
    match state.get(&id) {
        Ok(entry) => {
            let session = entry.session.lock().await;
            Ok(Json(CallRecord::from_session(&session)))
        }
        Err(ServerError::CallEnded) => state
            .ended_record(&id)
            .map(Json)
            .ok_or(ServerError::NotFound(id)),
        Err(e) => Err(e),
    }
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "active_calls": state.active_calls(),
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain")],
            "metrics disabled".to_string(),
        ),
    }
}
