//! API error types and JSON error response formatting.
//!
//! Every failure leaves the API as `{ "error", "message", "category"? }`.
//! Provider failures keep their classifier category so the widget can show
//! the message as-is.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use ecobot_chat::{ChatError, ErrorCategory};
use ecobot_core::error::EcobotError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "rate_limited").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Classifier category, for provider failures only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - empty or oversized message.
    BadRequest(String),
    /// 404 Not Found - unknown or expired session.
    NotFound(String),
    /// 409 Conflict - a reply is still pending for this session.
    Conflict(String),
    /// 429 Too Many Requests - local request budget exhausted.
    TooManyRequests(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// Classified failure reported by the completion provider.
    Provider(ErrorCategory, String),
}

impl ApiError {
    pub fn session_not_found(id: uuid::Uuid) -> Self {
        ApiError::NotFound(format!("session {} not found", id))
    }

    /// Status a provider failure is reported with.
    pub fn provider_status(category: ErrorCategory) -> StatusCode {
        match category {
            ErrorCategory::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCategory::ContentBlocked => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::ServiceUnavailable | ErrorCategory::Network => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorCategory::Auth | ErrorCategory::Permission | ErrorCategory::Unknown => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, category) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::TooManyRequests(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "too_many_requests", msg, None)
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None)
            }
            ApiError::Provider(category, msg) => (
                Self::provider_status(category),
                category.as_str(),
                msg,
                Some(category.as_str().to_string()),
            ),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            category,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        if let Some(category) = err.category() {
            return ApiError::Provider(category, err.to_string());
        }
        match err {
            ChatError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ChatError::AlreadyInProgress => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<EcobotError> for ApiError {
    fn from(err: EcobotError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_errors_map_to_statuses() {
        let cases = [
            (ChatError::empty_message(), StatusCode::BAD_REQUEST),
            (ChatError::AlreadyInProgress, StatusCode::CONFLICT),
            (ChatError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (ChatError::Auth, StatusCode::BAD_GATEWAY),
            (ChatError::Permission, StatusCode::BAD_GATEWAY),
            (ChatError::ServiceUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (ChatError::Network, StatusCode::SERVICE_UNAVAILABLE),
            (ChatError::ContentBlocked, StatusCode::UNPROCESSABLE_ENTITY),
            (ChatError::Unknown("boom".to_string()), StatusCode::BAD_GATEWAY),
            (ChatError::Config("bad".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let resp = ApiError::from(err).into_response();
            assert_eq!(resp.status(), status);
        }
    }

    #[test]
    fn test_provider_error_keeps_category() {
        match ApiError::from(ChatError::Network) {
            ApiError::Provider(category, msg) => {
                assert_eq!(category, ErrorCategory::Network);
                assert_eq!(msg, "Network error. Please check your internet connection.");
            }
            other => panic!("unexpected mapping: {:?}", other),
        }
    }
}
