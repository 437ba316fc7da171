use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use llm_core::{relay, shape, ChatMessage, Role, StreamChunk};
use serde::Serialize;
use serde_json::Value;
use speech_core::{forward_speech, SpeechResult};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::session::SessionStore;
use crate::state::AppState;
use crate::validation::{validate_chat_request, validate_conversation_id, validate_speech_request};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    gemini_configured: bool,
    azure_speech_configured: bool,
    redis_configured: bool,
}

#[derive(Serialize)]
pub struct ServiceInfo {
    name: &'static str,
    version: &'static str,
    endpoints: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    user_id: String,
    history: Vec<ChatMessage>,
}

pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "chat-relay",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            "POST /api/chat",
            "POST /api/speech",
            "GET /api/history/{user_id}",
            "GET /api/health",
        ],
    })
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        gemini_configured: !state.config.gemini_api_key.is_empty(),
        azure_speech_configured: state.speech.is_some(),
        redis_configured: state.sessions.is_some(),
    })
}

/// Stream a model reply for the submitted history as `text/plain`.
///
/// Structural problems are answered with a 400 before anything is streamed.
/// Once the body starts, the status is 200 whatever happens upstream; a
/// failure shows up as a final apology in the text.
pub async fn chat_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let request = validate_chat_request(&body)?;

    let window = state.config.context_window();
    let history = window.apply(&request.history);
    if history.len() < request.history.len() {
        info!(
            "Context window dropped {} of {} message(s)",
            request.history.len() - history.len(),
            request.history.len()
        );
    }

    let messages = shape(history, &state.config.system_instruction);
    info!("Chat request: history={}, upstream messages={}", request.history.len(), messages.len());

    let chunks = relay(state.llm.clone(), messages, state.config.relay_options());

    let recorder = match (state.sessions.clone(), request.user_id) {
        (Some(store), Some(user_id)) => Some(TurnRecorder {
            store,
            user_id,
            prompt: request.history.last().filter(|m| m.role == Role::User).cloned(),
        }),
        _ => None,
    };

    let started = Instant::now();
    let body = async_stream::stream! {
        futures_util::pin_mut!(chunks);
        let mut reply = String::new();
        let mut failed = false;
        while let Some(chunk) = chunks.next().await {
            match &chunk {
                StreamChunk::Text(text) => reply.push_str(text),
                StreamChunk::Failure(_) => failed = true,
            }
            yield Ok::<_, Infallible>(chunk.into_string());
        }
        info!(
            "Chat stream finished in {:.2}s: {} chars, failed={}",
            started.elapsed().as_secs_f64(),
            reply.chars().count(),
            failed
        );
        if let (Some(recorder), false) = (recorder, failed) {
            tokio::spawn(recorder.record(reply));
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Appends a completed turn to the session store.
struct TurnRecorder {
    store: Arc<dyn SessionStore>,
    user_id: String,
    prompt: Option<ChatMessage>,
}

impl TurnRecorder {
    async fn record(self, reply: String) {
        let mut turn: Vec<ChatMessage> = self.prompt.into_iter().collect();
        turn.push(ChatMessage::model(reply));
        match self.store.append(&self.user_id, &turn).await {
            Ok(()) => debug!("Recorded {} message(s) for {}", turn.len(), self.user_id),
            Err(e) => warn!("Failed to record turn for {}: {}", self.user_id, e),
        }
    }
}

/// Synthesize speech for `text`. Upstream failures are a 200 with
/// `success: false` so the client can simply skip playback.
pub async fn speech_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SpeechResult>, ApiError> {
    let Json(body) = payload?;
    let text = validate_speech_request(&body)?;

    let synth = state.speech.as_ref().ok_or(ApiError::NotConfigured("Azure Speech"))?;
    Ok(Json(forward_speech(synth.as_ref(), &text).await))
}

pub async fn history_endpoint(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    validate_conversation_id(&user_id)?;
    let store = state.sessions.as_ref().ok_or(ApiError::NotConfigured("Session store"))?;

    let history = store
        .history(&user_id, state.config.session_history_limit)
        .await
        .map_err(|e| ApiError::Session(e.to_string()))?;

    Ok(Json(HistoryResponse { user_id, history }))
}
