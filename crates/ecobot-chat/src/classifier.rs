//! Maps raw completion failures to user-facing categories.
//!
//! Checks run from most specific to least specific and stop at the first
//! match: HTTP status first, then the failure kind reported by the
//! transport, then provider-specific substring heuristics on the error text.
//! Text matching is best-effort; providers do not publish a stable schema.

use std::fmt;

use crate::completion::{CompletionFailure, FailureKind};
use crate::error::ChatError;

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Auth,
    Permission,
    RateLimited,
    ServiceUnavailable,
    Network,
    ContentBlocked,
    Unknown,
}

impl ErrorCategory {
    /// Machine-readable name, used in logs and API bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Auth => "auth_error",
            ErrorCategory::Permission => "permission_error",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::ServiceUnavailable => "service_unavailable",
            ErrorCategory::Network => "network_error",
            ErrorCategory::ContentBlocked => "content_blocked",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Turn the category into the error surfaced to callers.
    ///
    /// Only `Unknown` keeps the provider's message; every other category
    /// has a fixed message.
    pub fn into_error(self, original: &str) -> ChatError {
        match self {
            ErrorCategory::Auth => ChatError::Auth,
            ErrorCategory::Permission => ChatError::Permission,
            ErrorCategory::RateLimited => ChatError::RateLimited,
            ErrorCategory::ServiceUnavailable => ChatError::ServiceUnavailable,
            ErrorCategory::Network => ChatError::Network,
            ErrorCategory::ContentBlocked => ChatError::ContentBlocked,
            ErrorCategory::Unknown => ChatError::Unknown(original.to_string()),
        }
    }

    fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(ErrorCategory::Auth),
            403 => Some(ErrorCategory::Permission),
            429 => Some(ErrorCategory::RateLimited),
            503 => Some(ErrorCategory::ServiceUnavailable),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a raw failure into a category.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, failure: &CompletionFailure) -> ErrorCategory;
}

// =============================================================================
// Rule-based classifier
// =============================================================================

/// A substring heuristic over the lowercased error message and code.
#[derive(Debug, Clone)]
pub struct TextRule {
    category: ErrorCategory,
    needles: Vec<String>,
    require_all: bool,
}

impl TextRule {
    /// Match when any needle occurs.
    pub fn any(category: ErrorCategory, needles: &[&str]) -> Self {
        Self {
            category,
            needles: needles.iter().map(|n| n.to_lowercase()).collect(),
            require_all: false,
        }
    }

    /// Match only when every needle occurs.
    pub fn all(category: ErrorCategory, needles: &[&str]) -> Self {
        Self {
            require_all: true,
            ..Self::any(category, needles)
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        if self.require_all {
            self.needles.iter().all(|n| haystack.contains(n.as_str()))
        } else {
            self.needles.iter().any(|n| haystack.contains(n.as_str()))
        }
    }
}

/// Status-first classifier with an ordered list of text fallbacks.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    rules: Vec<TextRule>,
}

impl RuleClassifier {
    pub fn new(rules: Vec<TextRule>) -> Self {
        Self { rules }
    }

    /// Heuristics for OpenRouter (OpenAI-compatible error bodies).
    pub fn openrouter() -> Self {
        Self::new(vec![
            TextRule::any(ErrorCategory::Auth, &["api key"]),
            TextRule::any(ErrorCategory::Permission, &["permission_denied"]),
            TextRule::any(ErrorCategory::RateLimited, &["rate limit", "quota"]),
            TextRule::any(ErrorCategory::ServiceUnavailable, &["service unavailable"]),
            TextRule::any(ErrorCategory::Network, &["network", "fetch"]),
            TextRule::all(ErrorCategory::ServiceUnavailable, &["model", "not found"]),
        ])
    }

    /// Heuristics for Google Gemini (`google.rpc.Status` error bodies).
    pub fn gemini() -> Self {
        Self::new(vec![
            TextRule::any(ErrorCategory::Auth, &["api_key_invalid", "api key"]),
            TextRule::any(ErrorCategory::Permission, &["permission_denied"]),
            TextRule::any(
                ErrorCategory::RateLimited,
                &["quota", "resource_exhausted", "too many requests", "rate limit"],
            ),
            TextRule::any(ErrorCategory::ServiceUnavailable, &["unavailable"]),
            TextRule::any(ErrorCategory::Network, &["network", "fetch"]),
            TextRule::any(ErrorCategory::ContentBlocked, &["blocked", "safety"]),
        ])
    }
}

impl ErrorClassifier for RuleClassifier {
    fn classify(&self, failure: &CompletionFailure) -> ErrorCategory {
        if let Some(category) = failure.status.and_then(ErrorCategory::from_status) {
            return category;
        }

        match failure.kind {
            FailureKind::Transport | FailureKind::Timeout => return ErrorCategory::Network,
            FailureKind::Blocked => return ErrorCategory::ContentBlocked,
            _ => {}
        }
        if failure.code.as_deref() == Some("NETWORK_ERROR") {
            return ErrorCategory::Network;
        }

        let mut haystack = failure.message.to_lowercase();
        if let Some(code) = &failure.code {
            haystack.push(' ');
            haystack.push_str(&code.to_lowercase());
        }

        self.rules
            .iter()
            .find(|rule| rule.matches(&haystack))
            .map(|rule| rule.category)
            .unwrap_or(ErrorCategory::Unknown)
    }
}

// =============================================================================
// Tests
// =============================================================================
