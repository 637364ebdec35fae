//! Speech platform capability.
//!
//! Recognition and synthesis are host services (a browser, an OS speech API).
//! The controller only talks to them through `SpeechPlatform`, and reads
//! results back as events the host delivers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::VoiceError;

/// What the host can do, queried once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpeechCapabilities {
    pub recognition: bool,
    pub synthesis: bool,
}

impl SpeechCapabilities {
    pub fn full() -> Self {
        Self {
            recognition: true,
            synthesis: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// Single-shot recognition request: one final result, no interim text.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOptions {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
}

/// A synthesis voice offered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub name: String,
    pub language: String,
}

impl VoiceInfo {
    pub fn new(name: &str, language: &str) -> Self {
        Self {
            name: name.to_string(),
            language: language.to_string(),
        }
    }
}

/// Text handed to the synthesizer, with playback settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Matches the id carried by the synthesis events for this utterance.
    pub id: u64,
    pub text: String,
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice: Option<String>,
}

/// Host speech services.
pub trait SpeechPlatform: Send + Sync {
    fn capabilities(&self) -> SpeechCapabilities;

    /// Open the microphone. Results arrive later as recognition events.
    fn start_recognition(&self, options: &RecognitionOptions) -> Result<(), VoiceError>;

    /// Stop listening and discard any pending result.
    fn stop_recognition(&self);

    /// Tear down recognition immediately.
    fn abort_recognition(&self);

    fn speak(&self, utterance: &Utterance) -> Result<(), VoiceError>;

    /// Cancel queued and in-progress playback.
    fn cancel_speech(&self);

    fn voices(&self) -> Vec<VoiceInfo>;
}

// =============================================================================
// NullSpeechPlatform
// =============================================================================

/// A host without speech services.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSpeechPlatform;

impl SpeechPlatform for NullSpeechPlatform {
    fn capabilities(&self) -> SpeechCapabilities {
        SpeechCapabilities::none()
    }

    fn start_recognition(&self, _options: &RecognitionOptions) -> Result<(), VoiceError> {
        Err(VoiceError::UnsupportedPlatform)
    }

    fn stop_recognition(&self) {}

    fn abort_recognition(&self) {}

    fn speak(&self, _utterance: &Utterance) -> Result<(), VoiceError> {
        Err(VoiceError::UnsupportedPlatform)
    }

    fn cancel_speech(&self) {}

    fn voices(&self) -> Vec<VoiceInfo> {
        Vec::new()
    }
}

// =============================================================================
// MockSpeechPlatform
// =============================================================================

/// A call received by `MockSpeechPlatform`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    StartRecognition(RecognitionOptions),
    StopRecognition,
    AbortRecognition,
    Speak(Utterance),
    CancelSpeech,
}

/// Records every call and fails on request.
#[derive(Debug)]
pub struct MockSpeechPlatform {
    capabilities: SpeechCapabilities,
    voices: Vec<VoiceInfo>,
    calls: Mutex<Vec<PlatformCall>>,
    fail_recognition: AtomicBool,
    fail_synthesis: AtomicBool,
}

impl Default for MockSpeechPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpeechPlatform {
    pub fn new() -> Self {
        Self::with_capabilities(SpeechCapabilities::full())
    }

    pub fn with_capabilities(capabilities: SpeechCapabilities) -> Self {
        Self {
            capabilities,
            voices: Vec::new(),
            calls: Mutex::new(Vec::new()),
            fail_recognition: AtomicBool::new(false),
            fail_synthesis: AtomicBool::new(false),
        }
    }

    pub fn with_voices(mut self, voices: Vec<VoiceInfo>) -> Self {
        self.voices = voices;
        self
    }

    pub fn fail_recognition(&self, fail: bool) {
        self.fail_recognition.store(fail, Ordering::SeqCst);
    }

    pub fn fail_synthesis(&self, fail: bool) {
        self.fail_synthesis.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().clone()
    }

    /// The most recent utterance handed to `speak`.
    pub fn last_utterance(&self) -> Option<Utterance> {
        self.lock().iter().rev().find_map(|call| match call {
            PlatformCall::Speak(u) => Some(u.clone()),
            _ => None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PlatformCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: PlatformCall) {
        self.lock().push(call);
    }
}

impl SpeechPlatform for MockSpeechPlatform {
    fn capabilities(&self) -> SpeechCapabilities {
        self.capabilities
    }

    fn start_recognition(&self, options: &RecognitionOptions) -> Result<(), VoiceError> {
        self.record(PlatformCall::StartRecognition(options.clone()));
        if self.fail_recognition.load(Ordering::SeqCst) {
            return Err(VoiceError::Platform("microphone unavailable".to_string()));
        }
        Ok(())
    }

    fn stop_recognition(&self) {
        self.record(PlatformCall::StopRecognition);
    }

    fn abort_recognition(&self) {
        self.record(PlatformCall::AbortRecognition);
    }

    fn speak(&self, utterance: &Utterance) -> Result<(), VoiceError> {
        self.record(PlatformCall::Speak(utterance.clone()));
        if self.fail_synthesis.load(Ordering::SeqCst) {
            return Err(VoiceError::Platform("synthesizer unavailable".to_string()));
        }
        Ok(())
    }

    fn cancel_speech(&self) {
        self.record(PlatformCall::CancelSpeech);
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_platform_supports_nothing() {
        let platform = NullSpeechPlatform;
        assert_eq!(platform.capabilities(), SpeechCapabilities::none());
        let options = RecognitionOptions {
            language: "en-US".to_string(),
            continuous: false,
            interim_results: false,
        };
        assert_eq!(
            platform.start_recognition(&options),
            Err(VoiceError::UnsupportedPlatform)
        );
        assert!(platform.voices().is_empty());
    }

    #[test]
    fn test_mock_platform_records_calls() {
        let platform = MockSpeechPlatform::new();
        platform.stop_recognition();
        platform.cancel_speech();
        assert_eq!(
            platform.calls(),
            vec![PlatformCall::StopRecognition, PlatformCall::CancelSpeech]
        );
        assert!(platform.last_utterance().is_none());
    }
}
