//! mirrorline server binary.
//!
//! Loads the configuration (writing a default file on first run),
//! sets up logging to stdout and the log file, then serves until killed.

use mirrorline::config::{format_duration, Bootstrap, Config};
use mirrorline::{logging, Server};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Config::load()? {
        Bootstrap::Loaded(config) => config,
        Bootstrap::DefaultsWritten(path) => {
            logging::init_console("info")?;
            info!(
                path = %path.display(),
                "Configuration file not found, generated a default one; review it and start again"
            );
            return Ok(());
        }
    };

    let _guard = logging::init(&config.log_level, &config.log_file)?;
    info!(log_file = %config.log_file.display(), "Started logging");

    info!(
        host = %config.host,
        port = config.port,
        read_timeout = %format_duration(config.read_timeout),
        response_delay = %format_duration(config.response_delay),
        workers = ?config.workers,
        "Read config"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(async {
        let server = Server::bind(&config).await?;
        server.run().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
