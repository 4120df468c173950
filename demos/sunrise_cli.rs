//! CLI sunrise alarm for Tuya bulbs.
//!
//! Reads a JSON file describing the bulbs, the ramp and the start time:
//!
//! ```json
//! {
//!   "devices": [
//!     {"id": "bf1234567890abcdef", "name": "Bedroom", "address": "192.168.1.40",
//!      "local_key": "0123456789abcdef", "version": "3.3"}
//!   ],
//!   "ramp": {"duration_secs": 1800},
//!   "start": {"mode": "sunrise", "sunrise": "06:45:00", "offset_minutes": -30}
//! }
//! ```
//!
//! Run with: cargo run --example sunrise_cli -- --config sunrise.json --help

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tuya_sunrise_rs::{
    Controller, DeviceDescriptor, DeviceReport, RampConfig, RampReport, SessionOptions, StartAt,
    StartMode,
};

#[derive(Parser)]
#[command(name = "sunrise-cli")]
#[command(about = "Sunrise alarm for Tuya smart bulbs", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "sunrise.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every enabled bulb answers
    Status,

    /// Show when the next ramp would start
    Next,

    /// Run a short ramp right away
    Test {
        /// Ramp duration in seconds (default: 60)
        #[arg(default_value = "60")]
        seconds: u64,
    },

    /// Run the full ramp now
    Now,

    /// Wait for the configured start time, then run the ramp
    Run,
}

#[derive(Deserialize)]
struct Config {
    devices: Vec<DeviceDescriptor>,
    #[serde(default)]
    session: SessionOptions,
    #[serde(default)]
    ramp: RampConfig,
    start: Option<StartMode>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let text = std::fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&text)?;
    let controller = Controller::new(config.session);

    match cli.command {
        Commands::Status => {
            println!("Checking {} device(s)...\n", config.devices.len());
            for (label, report) in controller.query_all(&config.devices).await {
                println!("{label}:");
                match report {
                    DeviceReport::Reachable(status) => {
                        println!("  Power: {}", if status.emitting() { "ON" } else { "OFF" });
                        if let Some(mode) = status.mode() {
                            println!("  Mode: {mode}");
                        }
                        if let Some(brightness) = status.brightness() {
                            println!("  Brightness: {}", brightness.value());
                        }
                        if let Some(temp) = status.temperature() {
                            println!("  Temperature: {}", temp.value());
                        }
                    }
                    DeviceReport::Unreachable(reason) => println!("  UNREACHABLE: {reason}"),
                }
            }
        }

        Commands::Next => {
            let mode = config.start.ok_or("no \"start\" section in the configuration")?;
            let at = mode.next_start_local(Local::now());
            println!("Ramp start: {}", at.format("%Y-%m-%d %H:%M:%S"));
            println!("Ramp duration: {} minutes", config.ramp.duration.as_secs() / 60);
        }

        Commands::Test { seconds } => {
            println!("Running {seconds}-second test ramp...\n");
            let report = controller
                .run_test_ramp(&config.devices, Duration::from_secs(seconds))
                .await?;
            print_report(&report);
        }

        Commands::Now => {
            let handle = controller.start_ramp(&config.devices, config.ramp, StartAt::Now)?;
            print_report(&handle.wait().await);
        }

        Commands::Run => {
            let mode = config.start.ok_or("no \"start\" section in the configuration")?;
            let handle = controller.schedule_ramp(&config.devices, config.ramp, &mode)?;
            let token = handle.token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    println!("\nCancelling...");
                    token.cancel();
                }
            });
            print_report(&handle.wait().await);
        }
    }

    Ok(())
}

fn print_report(report: &RampReport) {
    println!("Ramp {:?} after {} tick(s)", report.state, report.ticks);
    for bulb in &report.bulbs {
        print!("  {}: {} update(s), {} failure(s)", bulb.label, bulb.applied, bulb.failures);
        if let Some(last) = bulb.last_applied {
            print!(", last {}/{}", last.brightness, last.color_temp);
        }
        println!();
    }
}
