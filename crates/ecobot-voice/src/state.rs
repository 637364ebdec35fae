//! Voice state machine with thread-safe transitions.
//!
//! Listening and speaking are mutually exclusive:
//! - Idle -> Listening (microphone opened)
//! - Idle -> Speaking (utterance handed to the synthesizer)
//! - Listening -> Idle (transcript, error, end or stop)
//! - Speaking -> Idle (playback ended, failed or was cancelled)
//! - Speaking -> Listening (listening interrupts playback)

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// What the voice controller is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceState {
    Idle,
    Listening,
    Speaking,
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceState::Idle => write!(f, "Idle"),
            VoiceState::Listening => write!(f, "Listening"),
            VoiceState::Speaking => write!(f, "Speaking"),
        }
    }
}

impl VoiceState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &VoiceState) -> bool {
        matches!(
            (self, target),
            (VoiceState::Idle, VoiceState::Listening)
                | (VoiceState::Idle, VoiceState::Speaking)
                | (VoiceState::Listening, VoiceState::Idle)
                | (VoiceState::Speaking, VoiceState::Idle)
                | (VoiceState::Speaking, VoiceState::Listening)
        )
    }
}

/// Shared, lock-protected `VoiceState`.
///
/// Clones observe the same state.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<VoiceState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(VoiceState::Idle)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VoiceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current(&self) -> VoiceState {
        *self.lock()
    }

    /// Move to `target` if the transition is allowed; returns the previous state.
    pub fn transition(&self, target: VoiceState) -> Option<VoiceState> {
        let mut state = self.lock();
        if !state.can_transition_to(&target) {
            return None;
        }
        let previous = *state;
        tracing::debug!("Voice state: {} -> {}", previous, target);
        *state = target;
        Some(previous)
    }

    /// Move to `target` only when the current state is `from`.
    pub fn transition_from(&self, from: VoiceState, target: VoiceState) -> bool {
        let mut state = self.lock();
        if *state != from || !from.can_transition_to(&target) {
            return false;
        }
        tracing::debug!("Voice state: {} -> {}", from, target);
        *state = target;
        true
    }

    /// Force the state back to Idle.
    pub fn reset(&self) -> VoiceState {
        let mut state = self.lock();
        let previous = *state;
        *state = VoiceState::Idle;
        previous
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(VoiceState::Idle.to_string(), "Idle");
        assert_eq!(VoiceState::Listening.to_string(), "Listening");
        assert_eq!(VoiceState::Speaking.to_string(), "Speaking");
    }

    #[test]
    fn test_valid_transitions() {
        assert!(VoiceState::Idle.can_transition_to(&VoiceState::Listening));
        assert!(VoiceState::Idle.can_transition_to(&VoiceState::Speaking));
        assert!(VoiceState::Listening.can_transition_to(&VoiceState::Idle));
        assert!(VoiceState::Speaking.can_transition_to(&VoiceState::Idle));
        assert!(VoiceState::Speaking.can_transition_to(&VoiceState::Listening));
    }

    #[test]
    fn test_invalid_transitions() {
        // Never speak over an open microphone
        assert!(!VoiceState::Listening.can_transition_to(&VoiceState::Speaking));

        assert!(!VoiceState::Idle.can_transition_to(&VoiceState::Idle));
        assert!(!VoiceState::Listening.can_transition_to(&VoiceState::Listening));
        assert!(!VoiceState::Speaking.can_transition_to(&VoiceState::Speaking));
    }

    #[test]
    fn test_transition_returns_previous_state() {
        let sm = StateMachine::new();
        assert_eq!(sm.transition(VoiceState::Speaking), Some(VoiceState::Idle));
        assert_eq!(sm.transition(VoiceState::Listening), Some(VoiceState::Speaking));
        assert_eq!(sm.current(), VoiceState::Listening);
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let sm = StateMachine::new();
        sm.transition(VoiceState::Listening).unwrap();
        assert_eq!(sm.transition(VoiceState::Speaking), None);
        assert_eq!(sm.current(), VoiceState::Listening);
    }

    #[test]
    fn test_transition_from_checks_current_state() {
        let sm = StateMachine::new();
        assert!(!sm.transition_from(VoiceState::Speaking, VoiceState::Idle));
        sm.transition(VoiceState::Speaking).unwrap();
        assert!(sm.transition_from(VoiceState::Speaking, VoiceState::Idle));
        assert_eq!(sm.current(), VoiceState::Idle);
    }

    #[test]
    fn test_reset_and_shared_clone() {
        let sm1 = StateMachine::new();
        let sm2 = sm1.clone();
        sm1.transition(VoiceState::Listening).unwrap();
        assert_eq!(sm2.current(), VoiceState::Listening);

        assert_eq!(sm2.reset(), VoiceState::Listening);
        assert_eq!(sm1.current(), VoiceState::Idle);
    }
}
