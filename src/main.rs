//! Session Engine - maintenance inspector for persisted engine state
//!
//! Run with `session-engine --help` for usage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use session_engine::{
    APP_NAME, AppState, Config, FileStorage, SessionStatus, StateBackend, Storage, VERSION,
};

#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(version = VERSION)]
#[command(about = "Inspect and maintain persisted agent session state")]
#[command(long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to state file
    #[arg(short, long)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List persisted sessions
    List,

    /// Show configuration
    Config {
        /// Initialize config file with defaults
        #[arg(long)]
        init: bool,
    },

    /// Delete every persisted session record
    Reset,
}

fn setup_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        // Use info level for our crate, warn for dependencies
        EnvFilter::new("info").add_directive("tokio=warn".parse()?)
    };

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;

            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(file).with_target(false))
                .with(filter)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .with(filter)
                .init();
        }
    }

    Ok(())
}

fn status_icon(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Running => "●",
        SessionStatus::Ready => "○",
        SessionStatus::Loading => "◌",
        SessionStatus::Paused => "◐",
        SessionStatus::Terminated => "✕",
    }
}

fn list_sessions(storage: &FileStorage) -> Result<()> {
    let records = storage.load_sessions()?;

    println!("Sessions:");
    println!();

    if records.is_empty() {
        println!("  (no sessions)");
        return Ok(());
    }

    for record in records {
        let note = match record.to_instance_data() {
            Ok(_) => String::new(),
            Err(e) => {
                warn!("Session '{}' will not restore: {}", record.title, e);
                "  [unrestorable]".to_string()
            }
        };
        println!(
            "  {} {} [{}] ({}) {}{}",
            status_icon(record.status),
            record.title,
            record.branch,
            record.program,
            record.id.short(),
            note
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre error hooks
    color_eyre::install()?;

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::config_file_path()?,
    };

    // Load configuration
    let config = Config::load_from(&config_path).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config, using defaults: {}", e);
        Config::default()
    });

    setup_logging(cli.debug || config.debug, config.log_file.as_deref())?;

    let state_path = match cli.state {
        Some(path) => path,
        None => Config::state_file_path()?,
    };
    let state = Arc::new(AppState::load_from(&state_path)?);
    let storage = FileStorage::new(state.clone(), config_path);

    match cli.command {
        Commands::List => list_sessions(&storage)?,

        Commands::Config { init } => {
            if init {
                Config::default().save_to(storage.config_path())?;
                println!(
                    "Configuration initialized at {:?}",
                    storage.config_path()
                );
            } else {
                println!("Configuration:");
                println!("{}", toml::to_string_pretty(&config)?);
                println!("\nConfig file: {:?}", storage.config_path());
                println!("State file: {:?}", state_path);
            }
        }

        Commands::Reset => {
            state.delete_all_instances()?;
            info!("Cleared persisted sessions in {:?}", state_path);
            println!("All persisted sessions removed.");
        }
    }

    Ok(())
}
