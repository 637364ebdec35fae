//! Error types for the conversational interface.

use ecobot_core::error::EcobotError;

use crate::classifier::ErrorCategory;

/// Errors surfaced by a conversation session.
///
/// Provider failures arrive here already classified; their display text is
/// the stable message a chat surface shows to the person chatting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("A reply is still pending. Please wait for it before sending another message.")]
    AlreadyInProgress,
    #[error("Invalid API key. Please verify your API key is correct.")]
    Auth,
    #[error("Permission denied. Please check your API key permissions and billing status.")]
    Permission,
    #[error("API rate limit exceeded. Please wait a moment and try again.")]
    RateLimited,
    #[error("The AI service is temporarily unavailable. Please try again in a few moments.")]
    ServiceUnavailable,
    #[error("Network error. Please check your internet connection.")]
    Network,
    #[error("Message was blocked by safety filters. Please try rephrasing your question.")]
    ContentBlocked,
    #[error("AI service error: {0}")]
    Unknown(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ChatError {
    /// The classifier category behind this error, if it came from a provider.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            ChatError::Auth => Some(ErrorCategory::Auth),
            ChatError::Permission => Some(ErrorCategory::Permission),
            ChatError::RateLimited => Some(ErrorCategory::RateLimited),
            ChatError::ServiceUnavailable => Some(ErrorCategory::ServiceUnavailable),
            ChatError::Network => Some(ErrorCategory::Network),
            ChatError::ContentBlocked => Some(ErrorCategory::ContentBlocked),
            ChatError::Unknown(_) => Some(ErrorCategory::Unknown),
            ChatError::InvalidInput(_) | ChatError::AlreadyInProgress | ChatError::Config(_) => {
                None
            }
        }
    }

    pub fn empty_message() -> Self {
        ChatError::InvalidInput("message cannot be empty".to_string())
    }

    pub fn message_too_long(limit: usize) -> Self {
        ChatError::InvalidInput(format!(
            "message exceeds maximum length of {} characters",
            limit
        ))
    }
}

impl From<EcobotError> for ChatError {
    fn from(err: EcobotError) -> Self {
        ChatError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::empty_message().to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::message_too_long(2000).to_string(),
            "message exceeds maximum length of 2000 characters"
        );
        assert_eq!(
            ChatError::RateLimited.to_string(),
            "API rate limit exceeded. Please wait a moment and try again."
        );
        assert_eq!(
            ChatError::Unknown("upstream exploded".to_string()).to_string(),
            "AI service error: upstream exploded"
        );
        assert_eq!(
            ChatError::Config("OPENROUTER_API_KEY is not set".to_string()).to_string(),
            "configuration error: OPENROUTER_API_KEY is not set"
        );
    }

    #[test]
    fn test_category_round_trip() {
        let categories = [
            ErrorCategory::Auth,
            ErrorCategory::Permission,
            ErrorCategory::RateLimited,
            ErrorCategory::ServiceUnavailable,
            ErrorCategory::Network,
            ErrorCategory::ContentBlocked,
            ErrorCategory::Unknown,
        ];
        for category in categories {
            let err = category.into_error("original");
            assert_eq!(err.category(), Some(category));
        }
    }

    #[test]
    fn test_local_errors_have_no_category() {
        assert!(ChatError::empty_message().category().is_none());
        assert!(ChatError::AlreadyInProgress.category().is_none());
        assert!(ChatError::Config(String::new()).category().is_none());
    }

    #[test]
    fn test_chat_error_from_ecobot_error() {
        let err: ChatError = EcobotError::Config("bad provider".to_string()).into();
        assert!(matches!(err, ChatError::Config(_)));
        assert!(err.to_string().contains("bad provider"));
    }

    #[test]
    fn test_unicode_inner_messages() {
        let err = ChatError::Unknown("model error: \u{1f4a5}".to_string());
        assert!(err.to_string().contains("\u{1f4a5}"));
    }
}
