//! Logwatch CLI
//!
//! Command-line interface for the log error-burst alerting service.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use logwatch::{load_config, Config};
use tokio_util::sync::CancellationToken;
use tracing::Level;

#[derive(Parser)]
#[command(name = "logwatch")]
#[command(about = "Log file error-burst detection and rate-limited alerting")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Polling interval in seconds (overrides config file)
    #[arg(long)]
    interval: Option<u64>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Poll continuously until interrupted
    #[default]
    Run,
    /// Run a single poll cycle and exit
    Once,
    /// Print the persisted state of every monitored file as JSON
    Status,
    /// Send a synthetic alert through every configured notifier
    TestAlert,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, interval={:?}, log_level={:?}",
        args.config,
        args.interval,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(interval) = args.interval {
        config.polling_interval_seconds = interval;
    }

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    match args.command.unwrap_or_default() {
        Command::Run => {
            let cancel = CancellationToken::new();
            logwatch::spawn_shutdown_handler(cancel.clone());
            logwatch::run(&config, cancel).await?;
        }
        Command::Once => {
            let reports = logwatch::run_once(&config).await?;
            let alerts = reports.iter().filter(|r| r.alerted()).count();
            tracing::info!("Checked {} file(s), {} alert(s) sent", reports.len(), alerts);
        }
        Command::Status => {
            let status = logwatch::status(&config)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::TestAlert => {
            let summary = logwatch::send_test_alert(&config).await?;
            tracing::info!("Test alert delivered via {} notifier(s)", summary.sent);
        }
    }

    Ok(())
}
