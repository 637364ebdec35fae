//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path parameters and JSON bodies via axum
//! extractors, works on the session registry in AppState, and returns JSON.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ecobot_core::types::{Message, Role};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
    pub model: String,
    pub uptime_secs: u64,
    pub active_sessions: u64,
}

/// A chat message as shown in the widget. The persona is never exposed.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            role: message.role,
            content: message.content,
            timestamp: message.timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub greeting: String,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub session_id: Uuid,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyResponse {
    pub session_id: Uuid,
    pub reply: String,
    pub messages: Vec<MessageResponse>,
}

fn visible(history: Vec<Message>) -> Vec<MessageResponse> {
    history
        .into_iter()
        .filter(|m| m.role != Role::System)
        .map(MessageResponse::from)
        .collect()
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - liveness plus provider details.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: state.client.name().to_string(),
        model: state.settings.model.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.session_count() as u64,
    })
}

// =============================================================================
// Chat sessions
// =============================================================================

/// POST /chat/sessions - open a conversation seeded with the persona.
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let handle = state.create_session()?;
    let messages = visible(handle.history().await);

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id: handle.id(),
            greeting: state.config.chat.greeting.clone(),
            messages,
        }),
    ))
}

/// GET /chat/sessions/{id}/messages - the conversation so far.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let handle = state.session(id).ok_or_else(|| ApiError::session_not_found(id))?;
    Ok(Json(MessagesResponse {
        session_id: id,
        messages: visible(handle.history().await),
    }))
}

/// POST /chat/sessions/{id}/messages - send one message, wait for the reply.
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<ReplyResponse>, ApiError> {
    let handle = state.session(id).ok_or_else(|| ApiError::session_not_found(id))?;

    let reply = handle.send(&body.message).await?;

    Ok(Json(ReplyResponse {
        session_id: id,
        reply,
        messages: visible(handle.history().await),
    }))
}

/// POST /chat/sessions/{id}/reset - clear the conversation, keep the persona.
pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let handle = state.session(id).ok_or_else(|| ApiError::session_not_found(id))?;
    handle.reset()?;
    Ok(Json(MessagesResponse {
        session_id: id,
        messages: visible(handle.history().await),
    }))
}

/// DELETE /chat/sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.remove_session(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::session_not_found(id))
    }
}
