//! cecd Daemon - Main entry point
//!
//! Serves the CEC control surface over HTTP and a USB serial link.

mod api;
mod config;
mod export;
mod serial;
mod server;
mod state;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "cecd")]
#[command(about = "Vendor-adaptive HDMI-CEC control daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "cecd.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Display vendor (optoma, nec, epson, samsung, lg, generic, or auto to detect)
    #[arg(long)]
    vendor: Option<String>,

    /// Scan the bus once, print the devices and exit
    #[arg(long)]
    scan_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("cecd v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;

    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }
    if let Some(vendor) = args.vendor {
        config.cec.vendor = Some(vendor);
    }

    info!(
        client = %config.cec.client_path,
        serial = %config.serial.device,
        vendor = config.cec.vendor.as_deref().unwrap_or("auto"),
        "Configuration loaded"
    );

    let state = state::AppState::new(config.clone())?;

    if args.scan_once {
        info!("Running single bus scan");
        match state.orchestrator.scan_devices().await {
            Ok(devices) => println!("{}", cecd_core::describe_devices(&devices)),
            Err(detail) => anyhow::bail!("Scan failed: {}", detail),
        }
    } else {
        server::run(state, &config.daemon.bind, config.daemon.tls.as_ref()).await?;
    }

    Ok(())
}
