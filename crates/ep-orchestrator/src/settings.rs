//! System network settings launcher

use std::io;
use std::process::{Command, Stdio};

use ep_core::config::OrchestratorConfig;
use ep_core::traits::SettingsLauncher;

/// Opens the network settings by spawning a command
#[derive(Debug, Clone)]
pub struct CommandSettingsLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandSettingsLauncher {
    /// Launcher for an explicit `program args...` command line
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Use the configured command, or the platform default when none is set
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(&config.settings_command).unwrap_or_else(Self::platform_default)
    }

    /// The network settings command for the current OS
    pub fn platform_default() -> Self {
        let (program, args): (&str, &[&str]) = if cfg!(target_os = "macos") {
            (
                "open",
                &["x-apple.systempreferences:com.apple.preference.network"],
            )
        } else if cfg!(target_os = "windows") {
            ("cmd", &["/C", "start", "ms-settings:network-wifi"])
        } else {
            ("nm-connection-editor", &[])
        };

        Self {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl SettingsLauncher for CommandSettingsLauncher {
    fn open_network_settings(&self) -> io::Result<()> {
        tracing::debug!(program = %self.program, args = ?self.args, "Opening network settings");
        // Not awaited: the settings window outlives the call
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
    }
}
