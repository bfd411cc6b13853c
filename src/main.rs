// This file is part of the bakery-control project and is licensed under the
// MIT License (see LICENSE.md for details).

//! Bakery climate controller
//!
//! A single-process daemon that samples a BME280 climate sensor, drives a
//! fan relay and a buzzer from a temperature threshold with manual
//! overrides, blinks status LEDs, and exchanges telemetry and control
//! messages with a broker, a cloud database and a chat bot.

mod config;
mod control;
mod hardware;
mod indicator;
mod remote;
mod runtime;
mod sampling;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};

use config::Config;
use runtime::Daemon;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Validate the configuration file and exit
    #[arg(long)]
    validate_config: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        LevelFilter::Off
    } else if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.validate_config {
        Config::from_file(&args.config)?;
        println!("Configuration file is valid: {}", args.config.display());
        return Ok(());
    }

    let config = if args.config.exists() {
        Config::from_file(&args.config)?
    } else {
        info!(
            "no configuration file at {}, using defaults",
            args.config.display()
        );
        let config = Config::default();
        config.validate()?;
        config
    };

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;
    info!("controller running, press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Error waiting for shutdown signal: {}", e);
    } else {
        info!("received shutdown signal");
    }
    daemon.shutdown();
    daemon.join().await?;

    Ok(())
}
