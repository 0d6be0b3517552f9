use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use spindle_panel::{KeyboardInput, LogRenderer, PanelClient, PanelConfig};
use spindle_state::logging::{self, init_logging_with_level};

/// spindle display panel
///
/// Connects to a spindle hub and drives the e-ink and OLED render paths.
/// Without hardware drivers the renders are written to the log.
#[derive(Parser, Debug)]
#[command(name = "spindle-panel")]
#[command(about = "Hardware display client for a spindle hub")]
#[command(version)]
pub struct Args {
    /// Hub event channel URL (overrides SPINDLE_BACKEND_URL)
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Read control input from stdin: + / - rotate, p press, l long press, t X Y touch
    #[arg(long)]
    pub keyboard: bool,
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if !logging::is_valid_level(&self.log_level) {
            return Err(anyhow::anyhow!(
                "Invalid log level '{}'. Valid levels: {}",
                self.log_level,
                logging::LOG_LEVELS.join(", ")
            ));
        }
        Ok(())
    }

    fn panel_config(&self) -> PanelConfig {
        let config = PanelConfig::from_env();
        match &self.backend_url {
            Some(url) => config.with_backend_url(url.clone()),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    let level = args.log_level.to_lowercase();
    init_logging_with_level(logging::mode_for_level(&level), &level)
        .context("Failed to initialize logging")?;

    let config = args.panel_config();
    info!(backend = %config.backend_url, keyboard = args.keyboard, "Starting panel");

    let mut client = PanelClient::new(config, Arc::new(LogRenderer));
    if args.keyboard {
        client = client.with_input(KeyboardInput::spawn());
    }
    let handle = client.start().context("Invalid panel configuration")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    let stats = handle.shutdown().await;
    info!("{}", stats);
    Ok(())
}
