//! CLI argument definitions for the EcoBot application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ecobot_core::config::{EcobotConfig, ProviderKind};

/// EcoBot, a sustainable-travel assistant backed by a remote LLM.
#[derive(Parser, Debug)]
#[command(name = "ecobot", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Completion provider (openrouter, gemini, mock).
    #[arg(long = "provider", global = true)]
    pub provider: Option<ProviderKind>,

    /// Model identifier passed to the provider.
    #[arg(short = 'm', long = "model", global = true)]
    pub model: Option<String>,

    /// Stream replies from the provider.
    #[arg(long = "stream", global = true)]
    pub stream: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Chat in the terminal (default).
    Chat,
    /// Serve the chat API for the web widget.
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// List the models the provider serves.
    Models,
    /// Send one message and print the reply.
    Ping {
        #[arg(default_value = "Hello! Give me one eco-friendly travel tip.")]
        message: String,
    },
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > ECOBOT_CONFIG env var > platform default (~/.ecobot/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ECOBOT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > ECOBOT_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(Command::Serve { port: Some(p) }) = self.command {
            return p;
        }
        if let Ok(val) = std::env::var("ECOBOT_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Apply flag overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut EcobotConfig) {
        if let Some(kind) = self.provider {
            if kind != config.provider.kind {
                // Model and endpoint belong to the previous provider
                config.provider.model.clear();
                config.provider.base_url.clear();
                config.provider.api_key.clear();
            }
            config.provider.kind = kind;
        }
        if let Some(ref model) = self.model {
            config.provider.model = model.clone();
        }
        if self.stream {
            config.provider.stream = true;
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        config.server.port = self.resolve_port(config.server.port);
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".ecobot").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".ecobot").join("config.toml");
    }
    PathBuf::from("config.toml")
}
