//! Voice I/O controller.
//!
//! The `VoiceController` turns speech into transcripts and reads replies
//! aloud through an injected `SpeechPlatform`, keeping listening and
//! speaking mutually exclusive. Host callbacks are fed back in through
//! `handle_recognition` and `handle_synthesis`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ecobot_core::config::VoiceConfig;

use crate::error::{RecognitionFailure, VoiceError};
use crate::platform::{RecognitionOptions, SpeechCapabilities, SpeechPlatform, Utterance, VoiceInfo};
use crate::state::{StateMachine, VoiceState};

/// Recognition callbacks delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Final transcript of the utterance.
    Result(String),
    /// Platform error code, e.g. `not-allowed`.
    Error(String),
    End,
}

/// Synthesis callbacks, tagged with the utterance id they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    End(u64),
    Error(u64, String),
}

/// What the owner of the controller should act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    /// Recognized text, already trimmed; submit it as a chat message.
    Transcript(String),
    /// Show `failure.advisory()` to the person.
    RecognitionFailed(RecognitionFailure),
}

pub struct VoiceController {
    platform: Arc<dyn SpeechPlatform>,
    capabilities: SpeechCapabilities,
    state: StateMachine,
    config: VoiceConfig,
    output_enabled: AtomicBool,
    current_utterance: AtomicU64,
    next_utterance: AtomicU64,
}

impl std::fmt::Debug for VoiceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceController")
            .field("capabilities", &self.capabilities)
            .field("state", &self.state.current())
            .field("output_enabled", &self.output_enabled())
            .finish()
    }
}

impl VoiceController {
    /// Create a controller. Capabilities are queried here, once.
    pub fn new(platform: Arc<dyn SpeechPlatform>, config: VoiceConfig) -> Self {
        let capabilities = platform.capabilities();
        tracing::info!(
            recognition = capabilities.recognition,
            synthesis = capabilities.synthesis,
            "Voice controller initialized"
        );
        if !capabilities.recognition {
            tracing::warn!("Speech recognition not supported on this platform");
        }

        let output_enabled = AtomicBool::new(config.output_enabled);
        Self {
            platform,
            capabilities,
            state: StateMachine::new(),
            config,
            output_enabled,
            current_utterance: AtomicU64::new(0),
            next_utterance: AtomicU64::new(1),
        }
    }

    pub fn capabilities(&self) -> SpeechCapabilities {
        self.capabilities
    }

    pub fn state(&self) -> VoiceState {
        self.state.current()
    }

    pub fn output_enabled(&self) -> bool {
        self.output_enabled.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Recognition
    // =========================================================================

    /// Open the microphone for one utterance.
    ///
    /// Playback in progress is cancelled first. A second call while
    /// listening fails with `AlreadyListening` and leaves recognition running.
    pub fn start_listening(&self) -> Result<(), VoiceError> {
        if !self.capabilities.recognition {
            return Err(VoiceError::UnsupportedPlatform);
        }

        match self.state.current() {
            VoiceState::Listening => return Err(VoiceError::AlreadyListening),
            VoiceState::Speaking => self.platform.cancel_speech(),
            VoiceState::Idle => {}
        }
        self.state
            .transition(VoiceState::Listening)
            .ok_or(VoiceError::AlreadyListening)?;

        let options = RecognitionOptions {
            language: self.config.language.clone(),
            continuous: false,
            interim_results: false,
        };
        if let Err(e) = self.platform.start_recognition(&options) {
            self.state.reset();
            tracing::warn!(error = %e, "Failed to start speech recognition");
            return Err(e);
        }

        tracing::info!(language = %options.language, "Listening");
        Ok(())
    }

    /// Close the microphone without producing a transcript.
    pub fn stop_listening(&self) -> Result<(), VoiceError> {
        if self.state.current() != VoiceState::Listening {
            return Err(VoiceError::NotListening);
        }
        self.platform.stop_recognition();
        self.state.transition_from(VoiceState::Listening, VoiceState::Idle);
        tracing::debug!("Listening stopped");
        Ok(())
    }

    /// Apply a recognition callback. Events outside `Listening` are stale.
    pub fn handle_recognition(&self, event: RecognitionEvent) -> Option<VoiceEvent> {
        if !self.state.transition_from(VoiceState::Listening, VoiceState::Idle) {
            tracing::debug!(?event, "Ignoring recognition event while not listening");
            return None;
        }

        match event {
            RecognitionEvent::Result(transcript) => {
                let transcript = transcript.trim();
                if transcript.is_empty() {
                    return None;
                }
                tracing::info!(chars = transcript.chars().count(), "Speech recognized");
                Some(VoiceEvent::Transcript(transcript.to_string()))
            }
            RecognitionEvent::Error(code) => {
                let failure = RecognitionFailure::from_code(&code);
                tracing::warn!(code = %code, "Speech recognition error");
                Some(VoiceEvent::RecognitionFailed(failure))
            }
            RecognitionEvent::End => None,
        }
    }

    // =========================================================================
    // Synthesis
    // =========================================================================

    /// Read `text` aloud.
    ///
    /// Returns `Ok(false)` without touching the platform when output is
    /// disabled, synthesis is unsupported or the text is blank. Earlier
    /// playback is cancelled before the new utterance starts.
    pub fn speak(&self, text: &str) -> Result<bool, VoiceError> {
        let text = text.trim();
        if !self.output_enabled() || !self.capabilities.synthesis || text.is_empty() {
            return Ok(false);
        }

        match self.state.current() {
            VoiceState::Listening => return Err(VoiceError::Busy),
            VoiceState::Speaking => self.platform.cancel_speech(),
            VoiceState::Idle => {
                self.state.transition(VoiceState::Speaking).ok_or(VoiceError::Busy)?;
            }
        }

        let id = self.next_utterance.fetch_add(1, Ordering::SeqCst);
        self.current_utterance.store(id, Ordering::SeqCst);
        let utterance = Utterance {
            id,
            text: text.to_string(),
            language: self.config.language.clone(),
            rate: self.config.rate,
            pitch: self.config.pitch,
            volume: self.config.volume,
            voice: choose_voice(&self.platform.voices(), &self.config),
        };

        if let Err(e) = self.platform.speak(&utterance) {
            self.state.transition_from(VoiceState::Speaking, VoiceState::Idle);
            tracing::warn!(error = %e, "Speech synthesis failed to start");
            return Err(e);
        }

        tracing::debug!(utterance = id, voice = ?utterance.voice, "Speaking");
        Ok(true)
    }

    /// Apply a synthesis callback. Only the current utterance counts.
    pub fn handle_synthesis(&self, event: SynthesisEvent) {
        let id = match &event {
            SynthesisEvent::End(id) | SynthesisEvent::Error(id, _) => *id,
        };
        if id != self.current_utterance.load(Ordering::SeqCst) {
            tracing::debug!(utterance = id, "Ignoring event for a superseded utterance");
            return;
        }
        if !self.state.transition_from(VoiceState::Speaking, VoiceState::Idle) {
            return;
        }
        if let SynthesisEvent::Error(_, reason) = event {
            tracing::warn!(utterance = id, reason = %reason, "Speech synthesis error");
        }
    }

    pub fn stop_speaking(&self) -> Result<(), VoiceError> {
        if self.state.current() != VoiceState::Speaking {
            return Err(VoiceError::NotSpeaking);
        }
        self.platform.cancel_speech();
        self.state.transition_from(VoiceState::Speaking, VoiceState::Idle);
        Ok(())
    }

    /// Toggle reading replies aloud. Disabling cancels playback.
    pub fn set_output_enabled(&self, enabled: bool) {
        self.output_enabled.store(enabled, Ordering::SeqCst);
        if !enabled && self.state.current() == VoiceState::Speaking {
            self.platform.cancel_speech();
            self.state.transition_from(VoiceState::Speaking, VoiceState::Idle);
        }
        tracing::info!(enabled, "Voice output toggled");
    }

    /// Release the microphone and the synthesizer. Safe to call repeatedly.
    pub fn shutdown(&self) {
        match self.state.reset() {
            VoiceState::Listening => self.platform.abort_recognition(),
            VoiceState::Speaking => self.platform.cancel_speech(),
            VoiceState::Idle => {}
        }
    }
}

impl Drop for VoiceController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// First voice whose name contains a preferred vendor or whose language
/// starts with the preferred prefix.
pub fn choose_voice(voices: &[VoiceInfo], config: &VoiceConfig) -> Option<String> {
    voices
        .iter()
        .find(|v| {
            config.preferred_voices.iter().any(|p| v.name.contains(p.as_str()))
                || (!config.preferred_lang_prefix.is_empty()
                    && v.language.starts_with(&config.preferred_lang_prefix))
        })
        .map(|v| v.name.clone())
}

// =============================================================================
// Tests
// =============================================================================
