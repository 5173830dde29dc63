//! Transport traits
//!
//! The provisioning SDK is an external collaborator. These traits describe
//! the slice of it the orchestrator drives: a factory that builds one device
//! handle per session, and the handle's asynchronous entry points.
//!
//! Entry points return as soon as the request is issued. Completion is
//! reported later through the listener passed in, or, for `connect`, only
//! through the [`EventChannel`](crate::events::EventChannel). Listeners may
//! run on any thread, possibly before the entry point has returned.

use bytes::Bytes;
use std::sync::Arc;

use crate::error::TransportError;
use crate::types::{AccessPoint, DeviceFailureReason, SecurityScheme, TransportKind};

/// Callback handed to the transport for one request
pub type Listener<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Result of a Wi-Fi scan
#[derive(Debug)]
pub enum ScanOutcome {
    /// Networks in the order the device reported them
    Networks(Vec<AccessPoint>),
    Failed(TransportError),
}

/// Progress and terminal signals of one provisioning attempt
#[derive(Debug)]
pub enum ProvisionSignal {
    /// Secure session for provisioning could not be created
    SessionCreationFailed(TransportError),
    /// Credentials reached the device (advisory)
    CredentialsSent,
    CredentialsSendFailed(TransportError),
    /// Device applied the credentials (advisory)
    CredentialsApplied,
    CredentialsApplyFailed(TransportError),
    /// Device tried the credentials and rejected them
    DeviceFailure(DeviceFailureReason),
    Succeeded,
    Failed(TransportError),
}

impl ProvisionSignal {
    /// Whether this signal ends the provisioning attempt
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            ProvisionSignal::CredentialsSent | ProvisionSignal::CredentialsApplied
        )
    }
}

/// Result of a custom data exchange
#[derive(Debug)]
pub enum ExchangeOutcome {
    Response(Bytes),
    Failed(TransportError),
}

/// Handle for one connection to one device
pub trait DeviceTransport: Send + Sync {
    /// Join the device's local link.
    ///
    /// No listener: the outcome arrives as a connectivity event.
    fn connect(&self, ssid: &str, password: &str) -> Result<(), TransportError>;

    /// Secret used when the secure session is established
    fn set_proof_of_possession(&self, secret: &str);

    /// Ask the device which Wi-Fi networks it can see
    fn scan_networks(&self, listener: Listener<ScanOutcome>) -> Result<(), TransportError>;

    /// Send Wi-Fi credentials and have the device apply them
    fn provision(
        &self,
        ssid: &str,
        password: &str,
        listener: Listener<ProvisionSignal>,
    ) -> Result<(), TransportError>;

    /// Single request/response exchange on an application endpoint
    fn send_custom_data(
        &self,
        endpoint: &str,
        payload: Bytes,
        listener: Listener<ExchangeOutcome>,
    ) -> Result<(), TransportError>;

    /// Drop the link. Best effort.
    fn disconnect(&self);
}

/// Builds device handles
pub trait TransportFactory: Send + Sync {
    /// Create a handle for a new device session
    fn create_device(
        &self,
        transport: TransportKind,
        security: SecurityScheme,
    ) -> Result<Arc<dyn DeviceTransport>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_signals_are_not_terminal() {
        assert!(!ProvisionSignal::CredentialsSent.is_terminal());
        assert!(!ProvisionSignal::CredentialsApplied.is_terminal());
        assert!(ProvisionSignal::Succeeded.is_terminal());
        assert!(ProvisionSignal::DeviceFailure(DeviceFailureReason::Unknown).is_terminal());
        assert!(ProvisionSignal::Failed(TransportError::Closed).is_terminal());
    }
}
