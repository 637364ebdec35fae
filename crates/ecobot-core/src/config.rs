use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EcobotError, Result};

/// Persona preamble seeded as the first (system) message of every session.
pub const DEFAULT_PERSONA: &str = "You are EcoBot, a helpful AI assistant specializing in sustainable travel and eco-friendly tourism.

Your expertise includes:
- Eco-friendly travel destinations and accommodations
- Carbon footprint reduction strategies for travelers
- Sustainable transportation options
- Local environmental conservation initiatives
- Green travel tips and best practices
- Climate-conscious travel planning

Always provide helpful, accurate, and environmentally-focused advice. Keep responses conversational, informative, and encouraging towards sustainable practices. If asked about topics outside sustainable travel, politely redirect the conversation back to eco-friendly travel topics.";

/// Welcome line the chat surface shows before the first exchange.
pub const DEFAULT_GREETING: &str = "Hello! I'm EcoBot, your AI-powered sustainable travel assistant. I can help you with eco-friendly travel tips, destination recommendations, carbon footprint reduction, and sustainable tourism practices. How can I assist you today?";

/// Top-level configuration for EcoBot.
///
/// Loaded from `~/.ecobot/config.toml` by default. Every section falls back
/// to its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcobotConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl EcobotConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EcobotConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EcobotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Which remote completion API backs the chat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenRouter,
    Gemini,
    /// Scripted offline replies, used for demos and tests.
    Mock,
}

impl ProviderKind {
    /// Environment variable consulted when no key is configured.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenRouter => Some("OPENROUTER_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Mock => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "anthropic/claude-3.5-sonnet",
            ProviderKind::Gemini => "gemini-1.5-flash-8b",
            ProviderKind::Mock => "mock",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Mock => "",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = EcobotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(EcobotError::Config(format!(
                "unknown provider '{}' (expected openrouter, gemini or mock)",
                other
            ))),
        }
    }
}

/// Remote completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Model identifier. Empty means the provider's default model.
    pub model: String,
    /// API key. Empty means "read from the provider's environment variable".
    pub api_key: String,
    /// Base URL override. Empty means the provider's public endpoint.
    pub base_url: String,
    /// Sent as `HTTP-Referer` to OpenRouter for app attribution.
    pub site_url: String,
    /// Sent as `X-Title` to OpenRouter for app attribution.
    pub site_name: String,
    /// Maximum output tokens per reply.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Request a token stream instead of a single response body.
    pub stream: bool,
    /// Upper bound for one completion round trip, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenRouter,
            model: String::new(),
            api_key: String::new(),
            base_url: String::new(),
            site_url: "https://ecotravel-omega.vercel.app/".to_string(),
            site_name: "EcoTravel Platform".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            stream: false,
            request_timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    /// The configured model, or the provider default when unset.
    pub fn effective_model(&self) -> String {
        if self.model.trim().is_empty() {
            self.kind.default_model().to_string()
        } else {
            self.model.trim().to_string()
        }
    }

    /// The configured base URL without a trailing slash, or the provider default.
    pub fn effective_base_url(&self) -> String {
        let url = if self.base_url.trim().is_empty() {
            self.kind.default_base_url()
        } else {
            self.base_url.trim()
        };
        url.trim_end_matches('/').to_string()
    }

    /// Resolve the API key.
    ///
    /// Priority: config file value > provider environment variable.
    /// Returns `None` when neither yields a non-blank key.
    pub fn resolve_api_key(&self) -> Option<String> {
        let configured = self.api_key.trim();
        if !configured.is_empty() {
            return Some(configured.to_string());
        }
        let var = self.kind.api_key_env()?;
        std::env::var(var)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum retained messages, persona included.
    pub max_history: usize,
    /// Maximum accepted length of one user message, in characters.
    pub max_message_chars: usize,
    /// System persona. Empty disables the persona entry.
    pub persona: String,
    /// Welcome text shown by chat surfaces; never sent to the provider.
    pub greeting: String,
    /// Idle minutes after which the API drops a session.
    pub session_timeout_minutes: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history: 10,
            max_message_chars: 2000,
            persona: DEFAULT_PERSONA.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            session_timeout_minutes: 30,
        }
    }
}

/// Voice input/output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Read assistant replies aloud.
    pub output_enabled: bool,
    /// BCP-47 language tag for recognition and synthesis.
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// Voice-name substrings preferred when choosing a synthesis voice.
    pub preferred_voices: Vec<String>,
    /// Language prefix accepted when no preferred voice name matches.
    pub preferred_lang_prefix: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            output_enabled: true,
            language: "en-US".to_string(),
            rate: 0.9,
            pitch: 1.0,
            volume: 0.8,
            preferred_voices: vec!["Google".to_string(), "Microsoft".to_string()],
            preferred_lang_prefix: "en".to_string(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Global request budget per second across all chat routes.
    pub requests_per_sec: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3030,
            requests_per_sec: 20,
        }
    }
}
