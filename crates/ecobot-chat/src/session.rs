//! Bounded conversation session.
//!
//! A session owns the ordered message history of one conversation, sends it
//! to a completion client on every turn and keeps it within `max_history`
//! entries. The persona (a system message) sits at index 0 and is never
//! evicted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use uuid::Uuid;

use ecobot_core::config::{ChatConfig, ProviderConfig};
use ecobot_core::types::{Message, Role};

use crate::classifier::ErrorClassifier;
use crate::completion::{CompletionClient, CompletionFailure, CompletionRequest};
use crate::error::ChatError;

// =============================================================================
// Settings
// =============================================================================

/// Per-session knobs, usually derived from `[provider]` and `[chat]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub persona: Option<String>,
    /// Upper bound on history length, persona included.
    pub max_history: usize,
    pub max_message_chars: usize,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    /// Budget for one full round trip, including every streamed fragment.
    pub request_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default(), &ChatConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(provider: &ProviderConfig, chat: &ChatConfig) -> Self {
        let persona = Some(chat.persona.trim().to_string()).filter(|p| !p.is_empty());
        Self {
            persona,
            max_history: chat.max_history,
            max_message_chars: chat.max_message_chars,
            model: provider.effective_model(),
            max_tokens: provider.max_tokens,
            temperature: provider.temperature,
            stream: provider.stream,
            request_timeout: Duration::from_secs(provider.request_timeout_secs),
        }
    }

    /// Reject bounds that leave no room for the persona plus one message.
    pub fn validate(&self) -> Result<(), ChatError> {
        let minimum = if self.persona.is_some() { 2 } else { 1 };
        if self.max_history < minimum {
            return Err(ChatError::Config(format!(
                "max_history must be at least {} (got {})",
                minimum, self.max_history
            )));
        }
        if self.max_message_chars == 0 {
            return Err(ChatError::Config("max_message_chars must be positive".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(ChatError::Config("request_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// ConversationSession
// =============================================================================

/// Serializable snapshot of session metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub exchange_count: u32,
    pub message_count: usize,
}

/// One conversation with a remote completion provider.
pub struct ConversationSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    last_message_at: DateTime<Utc>,
    exchange_count: u32,
    messages: Vec<Message>,
    settings: SessionSettings,
    client: Arc<dyn CompletionClient>,
    classifier: Arc<dyn ErrorClassifier>,
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("id", &self.id)
            .field("provider", &self.client.name())
            .field("messages", &self.messages.len())
            .field("exchange_count", &self.exchange_count)
            .finish()
    }
}

impl ConversationSession {
    /// Start a session seeded with the persona, if one is configured.
    ///
    /// Uses the client's own error classifier.
    pub fn new(client: Arc<dyn CompletionClient>, settings: SessionSettings) -> Result<Self, ChatError> {
        settings.validate()?;

        let now = Utc::now();
        let messages = settings
            .persona
            .as_ref()
            .map(|p| vec![Message::system(p.clone())])
            .unwrap_or_default();
        let classifier = client.classifier();

        let session = Self {
            id: Uuid::new_v4(),
            started_at: now,
            last_message_at: now,
            exchange_count: 0,
            messages,
            settings,
            client,
            classifier,
        };

        tracing::debug!(
            session_id = %session.id,
            provider = session.client.name(),
            max_history = session.settings.max_history,
            "Conversation session created"
        );
        Ok(session)
    }

    /// Replace the classifier used for failures.
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Messages in conversational order, persona first.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn persona(&self) -> Option<&Message> {
        self.messages.first().filter(|m| m.role == Role::System)
    }

    pub fn exchange_count(&self) -> u32 {
        self.exchange_count
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            started_at: self.started_at,
            last_message_at: self.last_message_at,
            exchange_count: self.exchange_count,
            message_count: self.messages.len(),
        }
    }

    /// True when nothing was sent for longer than `timeout_minutes`.
    pub fn is_expired(&self, timeout_minutes: u32) -> bool {
        let idle = Utc::now() - self.last_message_at;
        idle > chrono::Duration::minutes(i64::from(timeout_minutes))
    }

    /// Send one user message and return the assistant's reply.
    ///
    /// On failure the user message stays in history without a reply and
    /// the classified error is returned. No retries are made.
    pub async fn send(&mut self, text: &str) -> Result<String, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::empty_message());
        }
        if text.chars().count() > self.settings.max_message_chars {
            return Err(ChatError::message_too_long(self.settings.max_message_chars));
        }

        self.messages.push(Message::user(text));
        self.last_message_at = Utc::now();

        let request = CompletionRequest::from_history(
            &self.messages,
            &self.settings.model,
            self.settings.max_tokens,
            self.settings.temperature,
            self.settings.stream,
        );

        let timeout = self.settings.request_timeout;
        let outcome = tokio::time::timeout(timeout, collect_reply(self.client.as_ref(), request))
            .await
            .unwrap_or_else(|_| Err(CompletionFailure::timeout(timeout.as_secs())));

        let result = match outcome {
            Ok(reply) => {
                self.messages.push(Message::assistant(reply.clone()));
                self.exchange_count += 1;
                self.last_message_at = Utc::now();
                Ok(reply)
            }
            Err(failure) => {
                let category = self.classifier.classify(&failure);
                tracing::warn!(
                    session_id = %self.id,
                    provider = self.client.name(),
                    status = ?failure.status,
                    category = %category,
                    error = %failure,
                    "Completion request failed"
                );
                Err(category.into_error(&failure.message))
            }
        };

        self.trim();

        if result.is_ok() {
            tracing::info!(
                session_id = %self.id,
                history_len = self.messages.len(),
                exchanges = self.exchange_count,
                "Reply received"
            );
        }
        result
    }

    /// Drop everything but the persona. Idempotent.
    pub fn reset(&mut self) {
        let keep = usize::from(self.persona().is_some());
        self.messages.truncate(keep);
        self.exchange_count = 0;
        self.last_message_at = Utc::now();
        tracing::debug!(session_id = %self.id, "Conversation reset");
    }

    /// Evict the oldest non-persona entries until the bound holds.
    fn trim(&mut self) {
        let keep = usize::from(self.persona().is_some());
        let excess = self.messages.len().saturating_sub(self.settings.max_history);
        if excess > 0 {
            self.messages.drain(keep..keep + excess);
            tracing::debug!(session_id = %self.id, evicted = excess, "History trimmed");
        }
    }
}

/// Drain a fragment stream into one reply. Blank replies are failures.
async fn collect_reply(
    client: &dyn CompletionClient,
    request: CompletionRequest,
) -> Result<String, CompletionFailure> {
    let mut fragments = client.complete(request).await?;
    let mut reply = String::new();
    while let Some(fragment) = fragments.next().await {
        reply.push_str(&fragment?);
    }

    let reply = reply.trim();
    if reply.is_empty() {
        return Err(CompletionFailure::empty_response(client.name()));
    }
    Ok(reply.to_string())
}

// =============================================================================
// SessionHandle
// =============================================================================

/// Shareable handle that refuses overlapping sends.
///
/// A second `send` while one is pending fails with `AlreadyInProgress`
/// instead of queueing behind the first.
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    inner: Arc<Mutex<ConversationSession>>,
}

impl SessionHandle {
    pub fn new(session: ConversationSession) -> Self {
        Self {
            id: session.id(),
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn send(&self, text: &str) -> Result<String, ChatError> {
        let mut session = self
            .inner
            .try_lock()
            .map_err(|_| ChatError::AlreadyInProgress)?;
        session.send(text).await
    }

    pub fn reset(&self) -> Result<(), ChatError> {
        let mut session = self
            .inner
            .try_lock()
            .map_err(|_| ChatError::AlreadyInProgress)?;
        session.reset();
        Ok(())
    }

    /// Snapshot of the history. Waits for a pending send to finish.
    pub async fn history(&self) -> Vec<Message> {
        self.inner.lock().await.history().to_vec()
    }

    pub async fn summary(&self) -> SessionSummary {
        self.inner.lock().await.summary()
    }

    /// A session with a send in flight is never considered idle.
    pub fn is_expired(&self, timeout_minutes: u32) -> bool {
        self.inner
            .try_lock()
            .map(|s| s.is_expired(timeout_minutes))
            .unwrap_or(false)
    }
}

// =============================================================================
// Tests
// =============================================================================
