use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use spindle::{Args, Config, Spindle};
use spindle_state::logging::{init_logging_with_level, mode_for_level};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            std::process::exit(2);
        }
    };

    if let Err(e) = init_logging_with_level(mode_for_level(&config.log_level), &config.log_level) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("Spindle failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    config.print_summary();

    let service = Spindle::start(&config)
        .await
        .context("Failed to start spindle")?;

    info!("Displays connect to {}", service.ws_url());
    info!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    let stats = service
        .shutdown()
        .await
        .context("Failed to shut down cleanly")?;
    info!("{}", stats);
    Ok(())
}
