//! Cloudreve CLI - browse, download and upload against a Cloudreve drive

use anyhow::Context;
use clap::{Parser, Subcommand};
use cloudreve_cli::{Command, Session, Settings, SettingsWatcher, logging, shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cloudreve")]
#[command(about = "Command-line client for Cloudreve drives")]
#[command(version)]
struct Args {
    /// Settings file; defaults to config.yml next to the executable
    #[arg(short, long, env = "CLOUDREVE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging regardless of the configured level
    #[arg(short, long, env = "CLOUDREVE_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: TopCommand,
}

#[derive(Subcommand, Debug)]
enum TopCommand {
    /// Read commands from stdin, following settings file changes
    Shell,

    #[command(flatten)]
    Run(Command),
}

fn default_config_path() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot locate executable")?;
    let dir = exe.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    Ok(dir.join("config.yml"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let settings = Settings::load(&config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;

    // Setup logging
    let level = if args.debug {
        tracing::Level::DEBUG
    } else {
        logging::parse_level(&settings.log.level)?
    };
    logging::init(level, settings.log_file(&config_path).as_deref())?;

    tracing::debug!("Settings loaded from {}", config_path.display());
    tracing::info!("Cloudreve at {}", settings.address);

    match args.command {
        TopCommand::Shell => {
            let watcher = SettingsWatcher::start(&config_path)?;
            shell::run(&watcher).await
        }
        TopCommand::Run(command) => {
            let session = Session::connect(&settings).await?;
            session.run(&command).await
        }
    }
}
