//! Remote completion client abstraction.
//!
//! Every provider is modelled as one capability: given an ordered list of
//! role-tagged turns, produce a lazy, finite stream of text fragments. A
//! provider that answers in one piece yields a stream of length one.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use ecobot_core::types::{Message, Role};

use crate::classifier::ErrorClassifier;

/// Ordered text fragments of one reply, concatenated in arrival order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, CompletionFailure>> + Send>>;

// =============================================================================
// Request types
// =============================================================================

/// One `{role, content}` pair as sent to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

impl CompletionRequest {
    /// Build a request carrying the full message list in order.
    pub fn from_history(
        history: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f32,
        stream: bool,
    ) -> Self {
        Self {
            model: model.to_string(),
            messages: history.iter().map(ChatTurn::from).collect(),
            max_tokens,
            temperature,
            stream,
        }
    }
}

/// A model advertised by a provider's listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: Option<String>,
}

// =============================================================================
// Failures
// =============================================================================

/// How a completion attempt failed, before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The provider answered with a non-success HTTP status.
    Http,
    /// No response was received (DNS, connect, reset).
    Transport,
    /// The round trip exceeded its time budget.
    Timeout,
    /// The provider answered but the reply text was empty.
    EmptyResponse,
    /// The response body could not be decoded.
    Decode,
    /// The provider refused to answer on safety grounds.
    Blocked,
}

/// Raw failure reported by a completion client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CompletionFailure {
    pub kind: FailureKind,
    /// HTTP status, when the transport exposed one.
    pub status: Option<u16>,
    /// Provider error code (e.g. `RESOURCE_EXHAUSTED`), when present.
    pub code: Option<String>,
    pub message: String,
}

impl CompletionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(FailureKind::Http, message)
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn timeout(secs: u64) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("network timeout: no reply within {}s", secs),
        )
    }

    pub fn empty_response(provider: &str) -> Self {
        Self::new(
            FailureKind::EmptyResponse,
            format!("Empty response from {} API", provider),
        )
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Decode, message)
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Blocked, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Map a `reqwest` error onto a failure kind.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::new(FailureKind::Timeout, format!("network timeout: {}", err));
        }
        if err.is_decode() {
            return Self::decode(format!("failed to decode response: {}", err));
        }
        if let Some(status) = err.status() {
            return Self::http(status.as_u16(), err.to_string());
        }
        Self::transport(format!("network request failed: {}", err))
    }
}

// =============================================================================
// Trait
// =============================================================================

/// A remote chat-completion endpoint.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Short provider name used in logs and error text.
    fn name(&self) -> &str;

    /// Classifier carrying this provider's error-text heuristics.
    fn classifier(&self) -> Arc<dyn ErrorClassifier>;

    /// Issue one completion request.
    ///
    /// Failures before the first fragment are returned directly; failures
    /// mid-stream surface as an `Err` item in the stream.
    async fn complete(&self, request: CompletionRequest) -> Result<FragmentStream, CompletionFailure>;

    /// List the models this provider serves.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, CompletionFailure>;
}

/// Wrap a complete reply as a stream of one fragment.
pub fn single_fragment(text: String) -> FragmentStream {
    Box::pin(tokio_stream::once(Ok(text)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn test_request_from_history_keeps_order_and_roles() {
        let history = vec![
            Message::system("persona"),
            Message::user("Hi"),
            Message::assistant("Hello!"),
            Message::user("And planes?"),
        ];
        let request =
            CompletionRequest::from_history(&history, "anthropic/claude-3.5-sonnet", 500, 0.7, false);

        assert_eq!(request.model, "anthropic/claude-3.5-sonnet");
        assert_eq!(request.max_tokens, 500);
        assert!(!request.stream);
        let roles: Vec<Role> = request.messages.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(request.messages[3].content, "And planes?");
    }

    #[test]
    fn test_chat_turn_serializes_openai_shape() {
        let turn = ChatTurn {
            role: Role::User,
            content: "Hi".to_string(),
        };
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "Hi"}));
    }

    #[test]
    fn test_failure_constructors() {
        let f = CompletionFailure::http(429, "Too Many Requests");
        assert_eq!(f.kind, FailureKind::Http);
        assert_eq!(f.status, Some(429));
        assert_eq!(f.to_string(), "Too Many Requests");

        let f = CompletionFailure::timeout(30);
        assert_eq!(f.kind, FailureKind::Timeout);
        assert!(f.message.contains("30s"));

        let f = CompletionFailure::empty_response("OpenRouter");
        assert_eq!(f.message, "Empty response from OpenRouter API");

        let f = CompletionFailure::transport("dns").with_code("NETWORK_ERROR");
        assert_eq!(f.code.as_deref(), Some("NETWORK_ERROR"));
        assert!(f.status.is_none());
    }

    #[tokio::test]
    async fn test_single_fragment_yields_once() {
        let mut stream = single_fragment("whole reply".to_string());
        assert_eq!(stream.next().await.unwrap().unwrap(), "whole reply");
        assert!(stream.next().await.is_none());
    }
}
