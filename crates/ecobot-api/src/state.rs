//! Application state shared across all route handlers.
//!
//! AppState holds the configuration, the completion client and the registry
//! of live conversation sessions. It is passed to handlers via axum's State
//! extractor.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use uuid::Uuid;

use ecobot_chat::{ChatError, CompletionClient, ConversationSession, SessionHandle, SessionSettings};
use ecobot_core::config::EcobotConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EcobotConfig>,
    pub client: Arc<dyn CompletionClient>,
    pub settings: SessionSettings,
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Fails when the chat settings derived from `config` are invalid.
    pub fn new(config: EcobotConfig, client: Arc<dyn CompletionClient>) -> Result<Self, ChatError> {
        let settings = SessionSettings::from_config(&config.provider, &config.chat);
        settings.validate()?;
        Ok(Self {
            config: Arc::new(config),
            client,
            settings,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            start_time: Instant::now(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, SessionHandle>> {
        self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, SessionHandle>> {
        self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a session and register it. Idle sessions are pruned first.
    pub fn create_session(&self) -> Result<SessionHandle, ChatError> {
        self.prune_expired();
        let session = ConversationSession::new(self.client.clone(), self.settings.clone())?;
        let handle = SessionHandle::new(session);
        self.write().insert(handle.id(), handle.clone());
        tracing::info!(session_id = %handle.id(), "Chat session opened");
        Ok(handle)
    }

    pub fn session(&self, id: Uuid) -> Option<SessionHandle> {
        self.read().get(&id).cloned()
    }

    pub fn remove_session(&self, id: Uuid) -> bool {
        let removed = self.write().remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Chat session closed");
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.read().len()
    }

    /// Drop sessions idle for longer than `chat.session_timeout_minutes`.
    pub fn prune_expired(&self) -> usize {
        let timeout = self.config.chat.session_timeout_minutes;
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, handle| !handle.is_expired(timeout));
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Expired chat sessions removed");
        }
        pruned
    }
}
