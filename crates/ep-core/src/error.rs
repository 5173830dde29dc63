//! Core error types for ep-provision

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::{DeviceFailureReason, OperationKind, SessionState};

/// Top-level error type for the ep-provision ecosystem
#[derive(Error, Debug)]
pub enum EpError {
    /// Provisioning operation error
    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the transport SDK.
///
/// These are causes: the orchestrator wraps them in a [`ProvisionError`]
/// that says which step of the workflow they broke.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The SDK could not build a device handle
    #[error("Transport construction failed: {0}")]
    Construction(String),

    /// Device could not be reached over the local link
    #[error("Device unreachable: {0}")]
    Unreachable(String),

    /// Secure session could not be established
    #[error("Security handshake failed: {0}")]
    Security(String),

    /// Device rejected or failed to answer a request
    #[error("Device rejected request: {0}")]
    Rejected(String),

    /// Handle was closed before the request completed
    #[error("Transport closed")]
    Closed,

    /// Anything else the SDK reports
    #[error("{0}")]
    Other(String),
}

/// Who is expected to act on a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Transport or SDK internal failure
    Transport,
    /// The device reported an application-level failure
    Device,
    /// The caller used the API incorrectly (wrong state, overlapping calls)
    Caller,
}

/// Failures surfaced to callers of the provisioning operations
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Operation invoked outside the state it requires
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// A completion of the same kind is still outstanding
    #[error("A {0} operation is already pending")]
    AlreadyPending(OperationKind),

    /// The transport handle could not be created
    #[error("Failed to initialize device session")]
    Initialization(#[source] TransportError),

    /// Connecting to the device failed
    #[error("Device connection failed")]
    ConnectionFailed(#[source] Option<TransportError>),

    /// Wi-Fi scan failed
    #[error("Wi-Fi network scan failed")]
    ScanFailed(#[source] TransportError),

    /// Secure session for provisioning could not be created
    #[error("Session creation failed")]
    SessionCreationFailed(#[source] TransportError),

    /// Credentials could not be sent to the device
    #[error("Wi-Fi credentials failed to send to the device")]
    CredentialSendFailed(#[source] TransportError),

    /// Device could not apply the credentials
    #[error("Wi-Fi credentials failed to apply on the device")]
    CredentialApplyFailed(#[source] TransportError),

    /// Device tried the credentials and reported failure
    #[error("Device reported provisioning failure: {0}")]
    DeviceReportedFailure(DeviceFailureReason),

    /// Provisioning failed for any other reason
    #[error("Provisioning failed")]
    ProvisioningFailed(#[source] TransportError),

    /// Custom data exchange failed
    #[error("Custom data exchange failed")]
    CustomDataFailed(#[source] TransportError),

    /// No terminating signal arrived in time
    #[error("{kind} timed out after {after:?}")]
    Timeout { kind: OperationKind, after: Duration },

    /// A new session was created while this completion was pending
    #[error("Pending {0} abandoned: session was replaced")]
    SessionReplaced(OperationKind),

    /// The session was closed while this completion was pending
    #[error("Pending {0} abandoned: session was closed")]
    SessionClosed(OperationKind),
}

impl ProvisionError {
    /// Stable machine-readable code for the call surface
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::InvalidState { .. } => "invalid_state",
            ProvisionError::AlreadyPending(_) => "already_pending",
            ProvisionError::Initialization(_) => "initialization_error",
            ProvisionError::ConnectionFailed(_) => "connection_failed",
            ProvisionError::ScanFailed(_) => "scan_failed",
            ProvisionError::SessionCreationFailed(_) => "session_creation_failed",
            ProvisionError::CredentialSendFailed(_) => "credential_send_failed",
            ProvisionError::CredentialApplyFailed(_) => "credential_apply_failed",
            ProvisionError::DeviceReportedFailure(_) => "device_reported_failure",
            ProvisionError::ProvisioningFailed(_) => "provisioning_failed",
            ProvisionError::CustomDataFailed(_) => "custom_data_failed",
            ProvisionError::Timeout { .. } => "timeout",
            ProvisionError::SessionReplaced(_) => "session_replaced",
            ProvisionError::SessionClosed(_) => "session_closed",
        }
    }

    /// Whether the transport, the device, or the caller is at fault
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProvisionError::InvalidState { .. }
            | ProvisionError::AlreadyPending(_)
            | ProvisionError::SessionReplaced(_)
            | ProvisionError::SessionClosed(_) => ErrorCategory::Caller,
            ProvisionError::DeviceReportedFailure(_) => ErrorCategory::Device,
            _ => ErrorCategory::Transport,
        }
    }

    /// Underlying transport cause, if any
    pub fn cause(&self) -> Option<&TransportError> {
        match self {
            ProvisionError::Initialization(e)
            | ProvisionError::ScanFailed(e)
            | ProvisionError::SessionCreationFailed(e)
            | ProvisionError::CredentialSendFailed(e)
            | ProvisionError::CredentialApplyFailed(e)
            | ProvisionError::ProvisioningFailed(e)
            | ProvisionError::CustomDataFailed(e) => Some(e),
            ProvisionError::ConnectionFailed(e) => e.as_ref(),
            _ => None,
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
