//! Aura Bot - Entry Point
//!
//! Modes:
//! - `telegram` (default): Telegram bot
//! - `chat`: interactive REPL against the same engine
//! - `state <ENTITY_ID>`: print one Home Assistant entity state as JSON

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use aura_bot::{AuraEngine, Config, HomeAssistantClient, HomeAssistantConfig};

/// Telegram expert bot answering from a knowledge base.
#[derive(Parser, Debug)]
#[command(name = "aura-bot")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env", global = true)]
    env_file: String,

    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the Telegram bot (default)
    Telegram,
    /// Chat with the engine in the terminal
    Chat,
    /// Fetch the state of a Home Assistant entity
    State {
        /// Entity id, e.g. light.living_room
        entity_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment first so RUST_LOG from .env applies
    let env_loaded = dotenvy::from_filename(&args.env_file);
    init_logging();
    if let Err(e) = env_loaded {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    match args.command.unwrap_or(Mode::Telegram) {
        Mode::Telegram => {
            info!("Aura Telegram Bot v{}", env!("CARGO_PKG_VERSION"));
            let config = Config::from_env().context("Invalid configuration")?;
            let engine = build_engine(&config)?;
            aura_bot::telegram::run_telegram_bot(&config, engine).await?;
        }
        Mode::Chat => {
            let config = Config::from_env().context("Invalid configuration")?;
            let engine = build_engine(&config)?;
            aura_bot::cli::run_chat(engine).await?;
        }
        Mode::State { entity_id } => {
            let ha_config = HomeAssistantConfig::from_env().context("Invalid configuration")?;
            let mut client = HomeAssistantClient::from_config(&ha_config);
            let state = client
                .with_session(|ha| Box::pin(async move { ha.get_entity_state(&entity_id).await }))
                .await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }

    Ok(())
}

fn build_engine(config: &Config) -> Result<AuraEngine> {
    debug!("Loaded configuration: {:?}", config);
    let knowledge_base = config
        .load_knowledge_base()
        .with_context(|| format!("Failed to read {}", config.knowledge_base_path.display()))?;
    AuraEngine::new(config, knowledge_base)
}

/// Log to stderr so the REPL and `state` output on stdout stay clean.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .init();
}
