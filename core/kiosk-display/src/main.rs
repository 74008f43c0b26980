//! kiosk-display: HDMI power control and MQTT bridge for the dashboard kiosk.
//!
//! ## Subcommands
//!
//! - `power <on|off|status>`: switch or report display power via `wlopm`
//! - `listen`: long-running MQTT listener (systemd service)
//! - `discovery`: publish retained Home Assistant discovery configs once

mod bridge;
mod client;
mod discovery;
mod signals;

use clap::{Parser, Subcommand, ValueEnum};
use kiosk_core::{config, logging, DisplayBackend, DisplayPower, KioskError, WlopmDisplay};
use kiosk_core::mqtt::MqttConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiosk-display")]
#[command(about = "Dashboard display power control and MQTT bridge")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch the display on/off or print its current state
    Power {
        #[arg(value_enum)]
        action: PowerAction,
    },

    /// Listen for display commands on MQTT and publish status
    Listen {
        /// MQTT config file (default: ~/dashboard-project/config/mqtt.json)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Publish Home Assistant discovery configs (retained)
    Discovery {
        /// MQTT config file (default: ~/dashboard-project/config/mqtt.json)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PowerAction {
    On,
    Off,
    Status,
}

fn main() {
    let cli = Cli::parse();
    let logging_guard = logging::init("kiosk-display");

    let result = match cli.command {
        Commands::Power { action } => run_power(action),
        Commands::Listen { config } => load_config(config).and_then(|c| bridge::run(&c)),
        Commands::Discovery { config } => load_config(config).and_then(|c| {
            let topics = discovery::run(&c)?;
            println!("Published HA discovery for switch + button (retained).");
            for topic in topics {
                println!("- {}", topic);
            }
            Ok(())
        }),
    };

    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "kiosk-display failed");
            1
        }
    };
    drop(logging_guard);
    std::process::exit(code);
}

fn run_power(action: PowerAction) -> kiosk_core::Result<()> {
    let display = WlopmDisplay::default();
    match action {
        PowerAction::On => {
            display.set_power(DisplayPower::On)?;
            println!("Display turned on");
        }
        PowerAction::Off => {
            display.set_power(DisplayPower::Off)?;
            println!("Display turned off");
        }
        PowerAction::Status => println!("Display is {}", display.query_power()?),
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> kiosk_core::Result<MqttConfig> {
    let path = match path {
        Some(path) => path,
        None => config::mqtt_config_path().ok_or(KioskError::HomeDirNotFound)?,
    };
    MqttConfig::load(&path)
}
