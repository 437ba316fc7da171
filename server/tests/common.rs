//! Common utilities for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use llm_core::mock::MockBackend;
use llm_core::{ChatMessage, CompletionBackend};
use serde_json::Value;
use server::session::{SessionError, SessionStore};
use server::{build_app, AppState, ServerConfig};
use speech_core::mock::MockSynthesizer;
use speech_core::{SpeechError, SpeechSynthesizer};
use tower::ServiceExt;

/// In-memory session store for tests.
#[derive(Default)]
pub struct MemorySessionStore {
    conversations: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn append(&self, conversation_id: &str, messages: &[ChatMessage]) -> Result<(), SessionError> {
        let mut conversations = self.conversations.lock().unwrap();
        conversations
            .entry(conversation_id.to_string())
            .or_default()
            .extend_from_slice(messages);
        Ok(())
    }

    async fn history(&self, conversation_id: &str, limit: usize) -> Result<Vec<ChatMessage>, SessionError> {
        let conversations = self.conversations.lock().unwrap();
        let messages = conversations.get(conversation_id).cloned().unwrap_or_default();
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skip).collect())
    }
}

/// Synthesizer that panics inside the request handler.
pub struct PanickingSynthesizer;

#[async_trait]
impl SpeechSynthesizer for PanickingSynthesizer {
    async fn synthesize_audio(&self, _text: &str) -> Result<Vec<u8>, SpeechError> {
        panic!("synthesizer exploded");
    }
}

/// Builds an app around mock collaborators.
pub struct TestApp {
    pub config: ServerConfig,
    pub llm: Arc<MockBackend>,
    pub speech: Option<Arc<MockSynthesizer>>,
    pub speech_override: Option<Arc<dyn SpeechSynthesizer>>,
    pub sessions: Option<Arc<MemorySessionStore>>,
}

impl TestApp {
    pub fn new(llm: MockBackend) -> Self {
        Self {
            config: ServerConfig {
                gemini_api_key: "test-key".into(),
                ..Default::default()
            },
            llm: Arc::new(llm),
            speech: None,
            speech_override: None,
            sessions: None,
        }
    }

    pub fn replying<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(MockBackend::from_fragments(fragments))
    }

    pub fn with_speech(mut self, synth: MockSynthesizer) -> Self {
        self.speech = Some(Arc::new(synth));
        self
    }

    /// Use `synth` in place of any mock synthesizer.
    pub fn with_synthesizer(mut self, synth: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech_override = Some(synth);
        self
    }

    pub fn with_sessions(mut self) -> Self {
        self.sessions = Some(Arc::new(MemorySessionStore::default()));
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut ServerConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn router(&self) -> Router {
        let llm: Arc<dyn CompletionBackend> = self.llm.clone();
        let speech = self.speech_override.clone().or_else(|| {
            self.speech
                .clone()
                .map(|s| s as Arc<dyn SpeechSynthesizer>)
        });
        let sessions = self
            .sessions
            .clone()
            .map(|s| s as Arc<dyn SessionStore>);
        build_app(AppState {
            config: Arc::new(self.config.clone()),
            llm,
            speech,
            sessions,
        })
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
