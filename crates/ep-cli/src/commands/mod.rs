//! CLI command implementations

mod bridge;
mod config;
mod run;

pub use bridge::bridge_command;
pub use config::{config_init, config_path, config_show, load_config_file, resolve_config_path};
pub use run::{run_command, RunOptions};
