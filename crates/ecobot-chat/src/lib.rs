//! Conversational interface for EcoBot.
//!
//! Provides the remote completion client abstraction with OpenRouter, Gemini
//! and scripted providers, classification of provider failures, and the
//! bounded conversation session that ties them together.

pub mod classifier;
pub mod completion;
pub mod error;
pub mod gemini;
pub mod mock;
pub mod openrouter;
pub mod provider;
pub mod session;
pub mod sse;

pub use classifier::{ErrorCategory, ErrorClassifier, RuleClassifier, TextRule};
pub use completion::{
    ChatTurn, CompletionClient, CompletionFailure, CompletionRequest, FailureKind, FragmentStream,
    ModelInfo,
};
pub use error::ChatError;
pub use gemini::GeminiClient;
pub use mock::{MockCompletionClient, MockReply};
pub use openrouter::OpenRouterClient;
pub use provider::build_client;
pub use session::{ConversationSession, SessionHandle, SessionSettings, SessionSummary};
