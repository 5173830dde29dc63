//! Output formatting utilities for the CLI
//!
//! Network tables and colored status messages for the terminal. Everything
//! here writes to stdout or stderr directly; the bridge command never uses
//! it, since its stdout carries protocol lines.

use tabled::{settings::Style, Table, Tabled};

use ep_core::types::WifiNetwork;

/// Format scanned networks as an ASCII table, in scan order
pub fn format_networks(networks: &[WifiNetwork]) -> String {
    if networks.is_empty() {
        return "No networks found".to_string();
    }

    #[derive(Tabled)]
    struct NetworkRow {
        #[tabled(rename = "SSID")]
        ssid: String,
        #[tabled(rename = "SIGNAL")]
        signal: String,
        #[tabled(rename = "SECURITY")]
        security: String,
        #[tabled(rename = "CHANNEL")]
        channel: String,
    }

    let rows: Vec<NetworkRow> = networks
        .iter()
        .map(|n| NetworkRow {
            ssid: truncate(&n.ssid, 24),
            signal: format_signal(n.signal_strength),
            security: n.security.to_string(),
            channel: n
                .channel
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Signal strength with a coarse quality bar
fn format_signal(rssi: i32) -> String {
    let bars = match rssi {
        r if r >= -50 => "▂▄▆█",
        r if r >= -60 => "▂▄▆ ",
        r if r >= -70 => "▂▄  ",
        _ => "▂   ",
    };
    format!("{} dBm {}", rssi, bars)
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix (stderr)
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow (stderr)
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
