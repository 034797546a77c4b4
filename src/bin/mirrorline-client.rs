//! mirrorline client binary.
//!
//! Sends one message to a mirrorline server and logs the reply. Settings
//! come from a JSON file (generated with defaults on first run) and can be
//! overridden on the command line.

use clap::Parser;
use mirrorline::client::{exchange, ClientConfig, DEFAULT_CLIENT_CONFIG_FILE};
use mirrorline::config::duration::parse_duration;
use mirrorline::config::{load_or_create, Bootstrap};
use mirrorline::logging;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mirrorline-client")]
#[command(version)]
#[command(about = "Send one message to a mirrorline server", long_about = None)]
struct Cli {
    /// Path to the client configuration file
    #[arg(short, long, default_value = DEFAULT_CLIENT_CONFIG_FILE)]
    config: PathBuf,

    /// Server address (e.g., 127.0.0.1:7890)
    #[arg(short, long)]
    server: Option<SocketAddr>,

    /// Pause between connecting and sending (e.g., 6s)
    #[arg(long, value_parser = parse_duration)]
    initial_delay: Option<Duration>,

    /// Text to send
    #[arg(short, long)]
    message: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// File that receives a copy of every log line
    #[arg(long, default_value = "client-log.txt")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = logging::init(&cli.log_level, &cli.log_file)?;
    info!("Starting the client");

    let mut config = match load_or_create(&cli.config, ClientConfig::default)? {
        Bootstrap::Loaded(config) => config,
        Bootstrap::DefaultsWritten(path) => {
            error!(
                path = %path.display(),
                "Configuration file not found, generated a default one"
            );
            return Ok(());
        }
    };

    if let Some(server) = cli.server {
        config.server = server;
    }
    if let Some(delay) = cli.initial_delay {
        config.initial_delay = delay;
    }
    if let Some(message) = cli.message {
        config.message = message;
    }
    info!(?config, "Read config");

    let result = exchange(&config).await?;
    info!(
        sent = result.sent,
        received = result.received,
        "Exchange complete"
    );
    println!("{}", result.response);

    Ok(())
}
