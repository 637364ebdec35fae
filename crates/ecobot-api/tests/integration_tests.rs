//! Integration tests for the EcoBot chat API.
//!
//! Each test drives a fresh router backed by a scripted completion client,
//! covering session lifecycle, message exchange and error mapping.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use uuid::Uuid;

use ecobot_api::create_router;
use ecobot_api::error::ErrorBody;
use ecobot_api::handlers::{HealthResponse, MessagesResponse, ReplyResponse, SessionResponse};
use ecobot_api::state::AppState;
use ecobot_chat::{CompletionFailure, MockCompletionClient, MockReply};
use ecobot_core::config::EcobotConfig;
use ecobot_core::types::Role;

// =============================================================================
// Helpers
// =============================================================================

fn make_state_with(config: EcobotConfig, script: Vec<MockReply>) -> AppState {
    AppState::new(config, Arc::new(MockCompletionClient::with_script(script))).unwrap()
}

fn make_state(script: Vec<MockReply>) -> AppState {
    make_state_with(EcobotConfig::default(), script)
}

fn reply(text: &str) -> MockReply {
    MockReply::Reply(text.to_string())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn send(session_id: Uuid, message: &str) -> Request<Body> {
    post_json(
        &format!("/chat/sessions/{}/messages", session_id),
        serde_json::json!({ "message": message }),
    )
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

async fn open_session(app: &axum::Router) -> Uuid {
    let resp = app.clone().oneshot(post_empty("/chat/sessions")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    json::<SessionResponse>(resp).await.session_id
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_happy_path() {
    let app = create_router(make_state(vec![]));
    let resp = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = json(resp).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.provider, "Mock");
    assert_eq!(health.active_sessions, 0);
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_create_session_returns_greeting_without_persona() {
    let app = create_router(make_state(vec![]));
    let resp = app.oneshot(post_empty("/chat/sessions")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let session: SessionResponse = json(resp).await;
    assert!(session.greeting.starts_with("Hello! I'm EcoBot"));
    assert!(session.messages.is_empty());
}

#[tokio::test]
async fn test_send_message_round_trip() {
    let state = make_state(vec![reply("Take the night train.")]);
    let app = create_router(state.clone());
    let id = open_session(&app).await;

    let resp = app.clone().oneshot(send(id, "  Paris to Rome?  ")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: ReplyResponse = json(resp).await;
    assert_eq!(body.reply, "Take the night train.");
    assert_eq!(body.messages.len(), 2);
    assert_eq!(body.messages[0].role, Role::User);
    assert_eq!(body.messages[0].content, "Paris to Rome?");
    assert_eq!(body.messages[1].role, Role::Assistant);

    let resp = app
        .oneshot(get(&format!("/chat/sessions/{}/messages", id)))
        .await
        .unwrap();
    let history: MessagesResponse = json(resp).await;
    assert_eq!(history.messages.len(), 2);

    // The provider saw the persona first
    let handle = state.session(id).unwrap();
    assert_eq!(handle.history().await[0].role, Role::System);
}

#[tokio::test]
async fn test_reset_clears_conversation() {
    let app = create_router(make_state(vec![reply("Hi!")]));
    let id = open_session(&app).await;
    app.clone().oneshot(send(id, "Hello")).await.unwrap();

    let resp = app
        .clone()
        .oneshot(post_empty(&format!("/chat/sessions/{}/reset", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: MessagesResponse = json(resp).await;
    assert!(body.messages.is_empty());
}

#[tokio::test]
async fn test_delete_session() {
    let app = create_router(make_state(vec![]));
    let id = open_session(&app).await;

    let uri = format!("/chat/sessions/{}", id);
    let delete = || Request::delete(uri.as_str()).body(Body::empty()).unwrap();

    let resp = app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.oneshot(send(id, "anyone there?")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let app = create_router(make_state(vec![]));
    let resp = app
        .oneshot(get(&format!("/chat/sessions/{}/messages", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = json(resp).await;
    assert_eq!(body.error, "not_found");
    assert!(body.category.is_none());
}

// =============================================================================
// Error paths
// =============================================================================

#[tokio::test]
async fn test_empty_message_is_400_and_not_recorded() {
    let app = create_router(make_state(vec![]));
    let id = open_session(&app).await;

    let resp = app.clone().oneshot(send(id, "   ")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = json(resp).await;
    assert_eq!(body.message, "message cannot be empty");

    let resp = app
        .oneshot(get(&format!("/chat/sessions/{}/messages", id)))
        .await
        .unwrap();
    let history: MessagesResponse = json(resp).await;
    assert!(history.messages.is_empty());
}

#[tokio::test]
async fn test_oversized_message_is_400() {
    let app = create_router(make_state(vec![]));
    let id = open_session(&app).await;
    let long = "a".repeat(2001);
    let resp = app.oneshot(send(id, &long)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provider_rate_limit_is_429_with_category() {
    let failure = CompletionFailure::http(429, "Too Many Requests");
    let app = create_router(make_state(vec![MockReply::Fail(failure)]));
    let id = open_session(&app).await;

    let resp = app.clone().oneshot(send(id, "Hi")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: ErrorBody = json(resp).await;
    assert_eq!(body.error, "rate_limited");
    assert_eq!(body.category.as_deref(), Some("rate_limited"));
    assert_eq!(
        body.message,
        "API rate limit exceeded. Please wait a moment and try again."
    );

    // The user message stays without a reply
    let resp = app
        .oneshot(get(&format!("/chat/sessions/{}/messages", id)))
        .await
        .unwrap();
    let history: MessagesResponse = json(resp).await;
    assert_eq!(history.messages.len(), 1);
    assert_eq!(history.messages[0].role, Role::User);
}

#[tokio::test]
async fn test_provider_failures_map_to_statuses() {
    let cases = [
        (CompletionFailure::http(401, "bad key"), StatusCode::BAD_GATEWAY),
        (CompletionFailure::transport("dns"), StatusCode::SERVICE_UNAVAILABLE),
        (CompletionFailure::blocked("SAFETY"), StatusCode::UNPROCESSABLE_ENTITY),
        (CompletionFailure::http(500, "oops"), StatusCode::BAD_GATEWAY),
    ];
    for (failure, status) in cases {
        let app = create_router(make_state(vec![MockReply::Fail(failure)]));
        let id = open_session(&app).await;
        let resp = app.oneshot(send(id, "Hi")).await.unwrap();
        assert_eq!(resp.status(), status);
    }
}

#[tokio::test]
async fn test_unknown_failure_message_is_passed_through() {
    let failure = CompletionFailure::http(500, "upstream hiccup");
    let app = create_router(make_state(vec![MockReply::Fail(failure)]));
    let id = open_session(&app).await;

    let resp = app.oneshot(send(id, "Hi")).await.unwrap();
    let body: ErrorBody = json(resp).await;
    assert_eq!(body.category.as_deref(), Some("unknown"));
    assert_eq!(body.message, "AI service error: upstream hiccup");
}

#[tokio::test]
async fn test_concurrent_send_is_409() {
    let script = vec![MockReply::Delayed(Duration::from_millis(300), "slow".to_string())];
    let app = create_router(make_state(script));
    let id = open_session(&app).await;

    let first = {
        let app = app.clone();
        tokio::spawn(async move { app.oneshot(send(id, "first")).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let resp = app.clone().oneshot(send(id, "second")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = first.await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_request_rate_limit() {
    let mut config = EcobotConfig::default();
    config.server.requests_per_sec = 1;
    let app = create_router(make_state_with(config, vec![]));

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let resp = app.clone().oneshot(post_empty("/chat/sessions")).await.unwrap();
        statuses.push(resp.status());
    }
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));

    // Health stays outside the limiter
    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
