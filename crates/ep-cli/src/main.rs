//! ep-provision CLI
//!
//! - `run`: provision a device end to end from the terminal
//! - `bridge`: expose the provisioning calls to a host runtime as JSON lines
//! - `config`: manage the configuration file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ep_provision::commands::{self, RunOptions};
use ep_provision::output::print_error;

#[derive(Parser)]
#[command(name = "ep-provision")]
#[command(author, version, about = "Wi-Fi provisioning for ESP devices over SoftAP or BLE")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a device: connect, scan, then send Wi-Fi credentials
    Run {
        /// SoftAP SSID (or BLE name) of the device
        #[arg(long, env = "EP_DEVICE_SSID")]
        device_ssid: String,
        /// SoftAP password of the device
        #[arg(long, default_value = "")]
        device_password: String,
        /// Proof-of-possession secret
        #[arg(long, env = "EP_POP")]
        pop: Option<String>,
        /// Wi-Fi network the device should join
        #[arg(long, required_unless_present = "scan_only")]
        ssid: Option<String>,
        /// Wi-Fi password for that network
        #[arg(long, default_value = "")]
        password: String,
        /// Only list the networks the device can see
        #[arg(long)]
        scan_only: bool,
        /// Exchange this payload on the custom-data endpoint after connecting
        #[arg(long)]
        custom_data: Option<String>,
    },

    /// Serve provisioning calls as JSON lines on stdin/stdout
    Bridge,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    // Logs go to stderr: the bridge owns stdout
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let result = match cli.command {
        Commands::Run {
            device_ssid,
            device_password,
            pop,
            ssid,
            password,
            scan_only,
            custom_data,
        } => {
            let options = RunOptions {
                device_ssid,
                device_password,
                pop,
                ssid,
                password,
                scan_only,
                custom_data,
            };
            match commands::load_config_file(cli.config.as_ref()) {
                Ok(config) => commands::run_command(config, options).await,
                Err(e) => Err(e),
            }
        }
        Commands::Bridge => match commands::load_config_file(cli.config.as_ref()) {
            Ok(config) => commands::bridge_command(config).await,
            Err(e) => Err(e),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(cli.config.as_ref()),
            ConfigAction::Path => {
                commands::config_path(cli.config.as_ref());
                Ok(())
            }
            ConfigAction::Init { force } => commands::config_init(cli.config.as_ref(), force),
        },
    };

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
