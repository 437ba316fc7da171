//! Integration tests for the HTTP surface

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use speech_core::mock::MockSynthesizer;
use speech_core::SpeechError;

use common::*;

#[tokio::test]
async fn test_service_info() {
    let app = TestApp::replying(Vec::<String>::new());
    let response = app.send(get("/")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "chat-relay");
    assert!(body["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e == "POST /api/chat"));
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::replying(Vec::<String>::new());
    let response = app.send(get("/api/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body,
        json!({
            "status": "healthy",
            "gemini_configured": true,
            "azure_speech_configured": false,
            "redis_configured": false
        })
    );
}

#[tokio::test]
async fn test_health_check_reports_optional_services() {
    let app = TestApp::replying(Vec::<String>::new())
        .with_speech(MockSynthesizer::returning(vec![1]))
        .with_sessions();
    let body = body_json(app.send(get("/api/health")).await).await;

    assert_eq!(body["azure_speech_configured"], true);
    assert_eq!(body["redis_configured"], true);
}

#[tokio::test]
async fn test_request_id_header() {
    let app = TestApp::replying(Vec::<String>::new());
    let response = app.send(get("/api/health")).await;

    let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let app = TestApp::replying(Vec::<String>::new());
    let response = app.send(get("/api/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = TestApp::replying(Vec::<String>::new());
    let response = app
        .send(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/chat")
                .header("origin", "http://localhost:3000")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_cors_restricted_origin() {
    let app = TestApp::replying(Vec::<String>::new()).configure(|c| {
        c.cors_allowed_origins = Some(vec!["https://kids.example".to_string()]);
    });
    let response = app
        .send(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/chat")
                .header("origin", "https://kids.example")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "https://kids.example"
    );
}

#[tokio::test]
async fn test_chat_invalid_role_is_400() {
    let app = TestApp::replying(["never"]);
    let response = app
        .send(post_json(
            "/api/chat",
            &json!({ "history": [{ "role": "system", "content": "x" }] }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    let body = body_json(response).await;
    assert_eq!(body, json!({ "error": "role must be 'user' or 'model'", "code": 400 }));
    assert!(app.llm.calls().is_empty());
}

#[tokio::test]
async fn test_chat_history_not_a_list_is_400() {
    let app = TestApp::replying(["never"]);
    let response = app
        .send(post_json("/api/chat", &json!({ "history": "hello" })))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "history must be a list");
}

#[tokio::test]
async fn test_chat_empty_body_is_400() {
    let app = TestApp::replying(["never"]);
    let response = app.send(post_json("/api/chat", &json!({}))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Request body cannot be empty");
}

#[tokio::test]
async fn test_chat_malformed_json_is_400() {
    let app = TestApp::replying(["never"]);
    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/chat")
                .header("content-type", "application/json")
                .body(Body::from("{\"history\": ["))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_chat_body_over_limit_is_413() {
    let app = TestApp::replying(["never"]).configure(|c| c.max_body_bytes = 64);
    let long = "a".repeat(256);
    let response = app
        .send(post_json(
            "/api/chat",
            &json!({ "history": [{ "role": "user", "content": long }] }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_speech_success() {
    let app = TestApp::replying(Vec::<String>::new())
        .with_speech(MockSynthesizer::returning(vec![0xff, 0xf3, 0x00]));
    let response = app
        .send(post_json("/api/speech", &json!({ "text": "Привет, друг! 🙂" })))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, json!({ "audio_base64": "//MA", "success": true }));

    let synth = app.speech.as_ref().unwrap();
    assert_eq!(synth.requests(), vec!["Привет, друг!".to_string()]);
}

#[tokio::test]
async fn test_speech_empty_text_is_400() {
    let app = TestApp::replying(Vec::<String>::new())
        .with_speech(MockSynthesizer::returning(vec![1]));
    let response = app.send(post_json("/api/speech", &json!({ "text": "" }))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "text is required");
    assert!(app.speech.as_ref().unwrap().requests().is_empty());
}

#[tokio::test]
async fn test_speech_text_too_long_is_400() {
    let app = TestApp::replying(Vec::<String>::new())
        .with_speech(MockSynthesizer::returning(vec![1]));
    let response = app
        .send(post_json("/api/speech", &json!({ "text": "а".repeat(5001) })))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_speech_timeout_reports_failure() {
    let app = TestApp::replying(Vec::<String>::new())
        .with_speech(MockSynthesizer::failing(|| SpeechError::Timeout));
    let response = app
        .send(post_json("/api/speech", &json!({ "text": "Привет" })))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["audio_base64"].is_null());
    assert_eq!(body["message"], "Speech service timed out");
}

#[tokio::test]
async fn test_speech_not_configured_is_500() {
    let app = TestApp::replying(Vec::<String>::new());
    let response = app
        .send(post_json("/api/speech", &json!({ "text": "Привет" })))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Azure Speech is not configured"
    );
}

#[tokio::test]
async fn test_history_without_store_is_500() {
    let app = TestApp::replying(Vec::<String>::new());
    let response = app.send(get("/api/history/kid-1")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Session store is not configured"
    );
}

#[tokio::test]
async fn test_history_invalid_id_is_400() {
    let app = TestApp::replying(Vec::<String>::new()).with_sessions();
    let response = app.send(get("/api/history/bad.id")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_unknown_conversation_is_empty() {
    let app = TestApp::replying(Vec::<String>::new()).with_sessions();
    let response = app.send(get("/api/history/kid-1")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "user_id": "kid-1", "history": [] })
    );
}

#[tokio::test]
async fn test_handler_panic_becomes_500() {
    let app = TestApp::replying(Vec::<String>::new())
        .with_synthesizer(Arc::new(PanickingSynthesizer));
    let response = app
        .send(post_json("/api/speech", &json!({ "text": "Привет" })))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Internal server error", "code": 500 })
    );
}
