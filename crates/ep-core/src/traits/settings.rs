//! Host settings trait

use std::io;

/// Opens the operating system's network settings screen.
///
/// Best effort: callers log failures instead of surfacing them.
pub trait SettingsLauncher: Send + Sync {
    /// Open the Wi-Fi / network settings UI
    fn open_network_settings(&self) -> io::Result<()>;
}
