//! Glue between the voice controller and the conversation session.
//!
//! A recognized transcript is sent like a typed message and the reply is
//! read aloud when voice output is on. Failed sends are answered with a
//! spoken apology, recognition failures with their advisory text.

use ecobot_chat::{ChatError, ConversationSession};
use ecobot_voice::{RecognitionEvent, VoiceController, VoiceEvent};

/// Spoken when no reply could be produced.
pub const APOLOGY: &str =
    "I apologize, but I'm having trouble responding right now. Please try again.";

/// What the chat surface shows after one turn.
#[derive(Debug)]
pub enum Turn {
    Reply(String),
    Failed(ChatError),
    /// Recognition failed, nothing was sent.
    Advisory(&'static str),
}

/// Send `text` through the session and speak the outcome.
pub async fn respond(session: &mut ConversationSession, voice: &VoiceController, text: &str) -> Turn {
    match session.send(text).await {
        Ok(reply) => {
            speak(voice, &reply);
            Turn::Reply(reply)
        }
        Err(e) => {
            // Rejected input never reached the provider
            if !matches!(e, ChatError::InvalidInput(_)) {
                speak(voice, APOLOGY);
            }
            Turn::Failed(e)
        }
    }
}

/// Act on an event produced by the voice controller.
pub async fn on_voice_event(
    session: &mut ConversationSession,
    voice: &VoiceController,
    event: VoiceEvent,
) -> Turn {
    match event {
        VoiceEvent::Transcript(text) => respond(session, voice, &text).await,
        VoiceEvent::RecognitionFailed(failure) => {
            tracing::debug!(reason = ?failure, "Voice input failed");
            Turn::Advisory(failure.advisory())
        }
    }
}

/// Feed a platform recognition callback through the controller and on to
/// the session. Stale events and recognizer shutdowns produce no turn.
pub async fn on_recognition(
    session: &mut ConversationSession,
    voice: &VoiceController,
    event: RecognitionEvent,
) -> Option<Turn> {
    let event = voice.handle_recognition(event)?;
    Some(on_voice_event(session, voice, event).await)
}

fn speak(voice: &VoiceController, text: &str) {
    if let Err(e) = voice.speak(text) {
        tracing::debug!(error = %e, "Reply not spoken");
    }
}
