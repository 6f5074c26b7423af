//! Partyline — party chat and channel routing over a console host.
//!
//! Loads the TOML configuration, wires the party system to the console
//! providers and the file-backed state storage, then hands control to the
//! interactive console loop.

use clap::{Arg, Command};
use commands::{CommandDispatcher, CommandOptions};
use config::{AppConfig, ConfigTemplates};
use console::ConsoleHost;
use party_system::PartySystem;
use std::path::PathBuf;
use std::sync::Arc;
use storage::TomlStateStorage;
use tracing::info;

mod commands;
mod config;
mod console;
mod logging;
mod storage;

/// Parsed command-line arguments.
struct CliArgs {
    config_path: PathBuf,
    log_level: Option<String>,
}

impl CliArgs {
    fn parse() -> Self {
        let matches = Command::new("partyline")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Party chat and channel routing for a multiplayer server")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("partyline.toml"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .get_matches();

        Self {
            config_path: PathBuf::from(
                matches
                    .get_one::<String>("config")
                    .map(String::as_str)
                    .unwrap_or("partyline.toml"),
            ),
            log_level: matches.get_one::<String>("log-level").cloned(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = AppConfig::load_or_create(&args.config_path)?;
    logging::setup_logging(&config.logging, args.log_level.as_deref())?;

    info!(config = %args.config_path.display(), "starting partyline");

    let host = ConsoleHost::new();
    let templates = Arc::new(ConfigTemplates::from(&config.chat));
    let services = host.services(templates);
    let storage = Arc::new(TomlStateStorage::new(config.storage.state_file.clone()));

    let system = Arc::new(PartySystem::new(
        services.clone(),
        storage,
        config.system_config(),
    ));
    system.filter().configure(&config.filter.banned_words);
    system.load().await?;

    let dispatcher = CommandDispatcher::new(
        system.clone(),
        services,
        CommandOptions::from(&config.chat),
    );

    console::run(system, dispatcher, host).await
}
