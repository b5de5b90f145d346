//! Gemini Client + Engine Integration Tests
//!
//! The real `GeminiClient` talks to a local axum server that mimics the
//! `generateContent` endpoint, so the whole answer path is exercised over HTTP.

use aura_bot::engine::{EMPTY_FALLBACK, ERROR_FALLBACK, SYSTEM_INSTRUCTION};
use aura_bot::{AuraEngine, GeminiClient, KnowledgeBase};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const API_KEY: &str = "fake-api-key";
const MODEL: &str = "gemini-1.5-flash";

/// A recorded call: path segment, API key header, JSON body.
type Call = (String, Option<String>, Value);

#[derive(Clone)]
struct FakeGemini {
    status: StatusCode,
    reply: Value,
    calls: Arc<Mutex<Vec<Call>>>,
}

async fn generate(
    State(fake): State<FakeGemini>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    fake.calls.lock().unwrap().push((model_action, key, body));
    (fake.status, Json(fake.reply.clone()))
}

async fn start(status: StatusCode, reply: Value) -> (GeminiClient, Arc<Mutex<Vec<Call>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let fake = FakeGemini {
        status,
        reply,
        calls: Arc::clone(&calls),
    };
    let app = Router::new()
        .route("/v1beta/models/{model_action}", post(generate))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = GeminiClient::new(API_KEY, MODEL, Duration::from_secs(5))
        .unwrap()
        .with_api_base(format!("http://{}", addr));
    (client, calls)
}

fn engine(client: GeminiClient) -> AuraEngine {
    AuraEngine::with_model(Arc::new(client), KnowledgeBase::new("Test knowledge base."))
}

#[tokio::test]
async fn test_answer_over_http() {
    let (client, calls) = start(
        StatusCode::OK,
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Mocked Gemini Response"}]},
                "finishReason": "STOP"
            }]
        }),
    )
    .await;

    let answer = engine(client).get_response("What is the test question?").await;
    assert_eq!(answer, "Mocked Gemini Response");

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (model_action, key, body) = &calls[0];
    assert_eq!(model_action, "gemini-1.5-flash:generateContent");
    assert_eq!(key.as_deref(), Some(API_KEY));

    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert_eq!(body["contents"][0]["role"], "user");
    assert!(prompt.contains("Test knowledge base."));
    assert!(prompt.contains("What is the test question?"));
    assert!(prompt.contains(SYSTEM_INSTRUCTION));
}

#[tokio::test]
async fn test_blocked_prompt_gets_empty_fallback() {
    let (client, calls) = start(
        StatusCode::OK,
        json!({"promptFeedback": {"blockReason": "SAFETY"}}),
    )
    .await;

    assert_eq!(engine(client).get_response("q").await, EMPTY_FALLBACK);
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_api_error_gets_error_fallback() {
    let (client, calls) = start(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"code": 429, "message": "Resource has been exhausted"}}),
    )
    .await;

    assert_eq!(engine(client).get_response("q").await, ERROR_FALLBACK);
    // No retries
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_client_reports_status_in_error() {
    let (client, _calls) = start(
        StatusCode::FORBIDDEN,
        json!({"error": {"message": "API key not valid"}}),
    )
    .await;

    let err = client.generate_content("q").await.unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("403"));
    assert!(message.contains("API key not valid"));
}

#[tokio::test]
async fn test_unreachable_api_gets_error_fallback() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GeminiClient::new(API_KEY, MODEL, Duration::from_secs(2))
        .unwrap()
        .with_api_base(format!("http://{}", addr));

    assert_eq!(engine(client).get_response("q").await, ERROR_FALLBACK);
}
