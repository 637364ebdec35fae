//! EcoBot voice crate - speech input and output for the chat surfaces.
//!
//! Drives a host speech platform through a small state machine:
//! Idle -> Listening -> Idle for dictation and Idle -> Speaking -> Idle for
//! reading replies aloud. The platform is injected, so hosts without speech
//! services run with `NullSpeechPlatform`.

pub mod controller;
pub mod error;
pub mod platform;
pub mod state;

pub use controller::{RecognitionEvent, SynthesisEvent, VoiceController, VoiceEvent};
pub use error::{RecognitionFailure, VoiceError};
pub use platform::{
    MockSpeechPlatform, NullSpeechPlatform, PlatformCall, SpeechCapabilities, SpeechPlatform,
    Utterance, VoiceInfo,
};
pub use state::VoiceState;
