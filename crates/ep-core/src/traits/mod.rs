//! Core trait definitions

mod settings;
mod transport;

pub use settings::SettingsLauncher;
pub use transport::{
    DeviceTransport, ExchangeOutcome, Listener, ProvisionSignal, ScanOutcome, TransportFactory,
};
