//! EcoBot application binary - composition root.
//!
//! Ties the EcoBot crates together into a single executable:
//! 1. Parse the CLI and load configuration from TOML
//! 2. Build the configured completion client
//! 3. Run the requested mode: terminal chat, the widget API server, a model
//!    listing or a one-shot ping

mod cli;
mod voice_chat;

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use ecobot_api::routes;
use ecobot_api::state::AppState;
use ecobot_chat::{build_client, ConversationSession, SessionSettings};
use ecobot_core::config::EcobotConfig;
use ecobot_core::types::Role;
use ecobot_voice::{NullSpeechPlatform, RecognitionEvent, VoiceController, VoiceError};

use cli::{CliArgs, Command};
use voice_chat::Turn;

const HELP: &str = "Commands: /reset  /history  /listen  /voice on|off  /stop  /quit";

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

// =============================================================================
// Modes
// =============================================================================

async fn serve(config: EcobotConfig) -> Result<(), Box<dyn Error>> {
    let client = build_client(&config.provider)?;
    let state = AppState::new(config, client)?;
    routes::start_server(state).await?;
    Ok(())
}

async fn list_models(config: &EcobotConfig) -> Result<(), Box<dyn Error>> {
    let client = build_client(&config.provider)?;
    let models = match client.list_models().await {
        Ok(models) => models,
        Err(failure) => {
            let category = client.classifier().classify(&failure);
            tracing::debug!(error = %failure, "Model listing failed");
            return Err(category.into_error(&failure.message).into());
        }
    };

    for model in models {
        match model.display_name {
            Some(name) => println!("{}\t{}", model.id, name),
            None => println!("{}", model.id),
        }
    }
    Ok(())
}

async fn ping(config: &EcobotConfig, message: &str) -> Result<(), Box<dyn Error>> {
    let client = build_client(&config.provider)?;
    let settings = SessionSettings::from_config(&config.provider, &config.chat);
    let mut session = ConversationSession::new(client, settings)?;

    let reply = session.send(message).await?;
    println!("{}", reply);
    Ok(())
}

fn init_config(path: &std::path::Path, force: bool) -> Result<(), Box<dyn Error>> {
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }
    EcobotConfig::default().save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

// =============================================================================
// Terminal chat
// =============================================================================

fn show(turn: &Turn) {
    match turn {
        Turn::Reply(reply) => println!("EcoBot: {}", reply),
        Turn::Failed(e) => println!("EcoBot: {}", e),
        Turn::Advisory(advice) => println!("{}", advice),
    }
}

async fn chat(config: EcobotConfig) -> Result<(), Box<dyn Error>> {
    let client = build_client(&config.provider)?;
    let settings = SessionSettings::from_config(&config.provider, &config.chat);
    let mut session = ConversationSession::new(client, settings)?;
    let voice = VoiceController::new(Arc::new(NullSpeechPlatform), config.voice.clone());

    // Speech hosts post recognition callbacks here; the null platform never does.
    let (_recognition_tx, mut recognition_rx) = mpsc::unbounded_channel::<RecognitionEvent>();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("EcoBot: {}", config.chat.greeting);
    println!("{}", HELP);

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            Some(event) = recognition_rx.recv() => {
                if let Some(turn) = voice_chat::on_recognition(&mut session, &voice, event).await {
                    println!();
                    show(&turn);
                }
                continue;
            }
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/reset" => {
                session.reset();
                println!("Conversation cleared.");
            }
            "/history" => {
                for message in session.history().iter().filter(|m| m.role != Role::System) {
                    let who = if message.role == Role::User { "You" } else { "EcoBot" };
                    println!("[{}] {}: {}", message.timestamp.format("%H:%M"), who, message.content);
                }
            }
            "/listen" => match voice.start_listening() {
                Ok(()) => println!("Listening..."),
                Err(VoiceError::UnsupportedPlatform) => println!(
                    "Speech recognition is not supported here. Type your message instead."
                ),
                Err(e) => println!("{}", e),
            },
            "/voice on" | "/voice off" => {
                let enabled = input.ends_with("on");
                voice.set_output_enabled(enabled);
                println!("Voice output {}.", if enabled { "on" } else { "off" });
            }
            "/stop" => {
                if voice.stop_speaking().is_err() {
                    println!("Nothing is playing.");
                }
            }
            text => {
                println!("EcoBot is typing...");
                let turn = voice_chat::respond(&mut session, &voice, text).await;
                show(&turn);
            }
        }
    }

    voice.shutdown();
    tracing::info!(exchanges = session.exchange_count(), "Chat ended");
    Ok(())
}

// =============================================================================
// Entry point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let mut config = if config_exists {
        EcobotConfig::load(&config_file)?
    } else {
        EcobotConfig::default()
    };
    args.apply(&mut config);

    init_tracing(&config.general.log_level);
    tracing::info!("Starting EcoBot v{}", env!("CARGO_PKG_VERSION"));
    if config_exists {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::debug!(path = %config_file.display(), "No configuration file, using defaults");
    }

    match args.command() {
        Command::Chat => chat(config).await,
        Command::Serve { .. } => serve(config).await,
        Command::Models => list_models(&config).await,
        Command::Ping { message } => ping(&config, &message).await,
        Command::Init { force } => init_config(&config_file, force),
    }
}
