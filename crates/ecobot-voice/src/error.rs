//! Error types for voice input and output.

use std::fmt;

/// Errors returned by the voice controller and speech platforms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("Speech recognition is not supported on this platform.")]
    UnsupportedPlatform,
    #[error("already listening")]
    AlreadyListening,
    #[error("not listening")]
    NotListening,
    #[error("not speaking")]
    NotSpeaking,
    #[error("cannot speak while listening")]
    Busy,
    #[error("speech platform error: {0}")]
    Platform(String),
}

/// Why a recognition attempt ended without a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionFailure {
    PermissionDenied,
    NoSpeech,
    Network,
    /// Any other platform code, kept for logging.
    Other(String),
}

impl RecognitionFailure {
    /// Map a platform error code such as `not-allowed` or `no-speech`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "not-allowed" | "service-not-allowed" => RecognitionFailure::PermissionDenied,
            "no-speech" => RecognitionFailure::NoSpeech,
            "network" => RecognitionFailure::Network,
            other => RecognitionFailure::Other(other.to_string()),
        }
    }

    /// Short hint shown to the person in place of the input prompt.
    pub fn advisory(&self) -> &'static str {
        match self {
            RecognitionFailure::PermissionDenied => {
                "Voice recognition failed. Please allow microphone access."
            }
            RecognitionFailure::NoSpeech => {
                "Voice recognition failed. No speech detected. Please try again."
            }
            RecognitionFailure::Network => {
                "Voice recognition failed. Network error. Check your connection."
            }
            RecognitionFailure::Other(_) => "Voice recognition failed. Please try again.",
        }
    }
}

impl fmt::Display for RecognitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.advisory())
    }
}
