//! ep-core: Core abstractions and configuration for ep-provision
//!
//! This crate provides the shared types, error taxonomy, transport traits,
//! connectivity event channel and configuration structures used by the
//! orchestrator, the simulated device and the CLI.

pub mod call;
pub mod config;
pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use error::{EpError, ErrorCategory, ProvisionError, TransportError};
pub use events::{EventChannel, Subscription};
pub use types::{ConnectivityEvent, OperationKind, SessionState, WifiNetwork};
