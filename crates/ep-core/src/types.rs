//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Host-assigned identifier for a device session.
///
/// Not guaranteed unique across sessions; it is a label, not a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a new device ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifies one pending completion and the listener handed to the transport
/// on its behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    /// Generate a fresh random correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell requests apart in logs
        let simple = self.0.simple().to_string();
        write!(f, "{}", &simple[..8])
    }
}

/// Kinds of operation that complete asynchronously.
///
/// The completion registry holds at most one pending completion per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Connect,
    Scan,
    Provision,
    CustomData,
}

impl OperationKind {
    /// All operation kinds, in registry order
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Connect,
        OperationKind::Scan,
        OperationKind::Provision,
        OperationKind::CustomData,
    ];
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Connect => write!(f, "connect"),
            OperationKind::Scan => write!(f, "scan"),
            OperationKind::Provision => write!(f, "provision"),
            OperationKind::CustomData => write!(f, "custom-data"),
        }
    }
}

/// Lifecycle state of the device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session has been created yet (or it was closed)
    #[default]
    Uninitialized,
    /// Transport handle allocated, not yet connected
    Created,
    /// Connect issued, waiting for a connectivity event
    Connecting,
    /// Device connected and idle
    Connected,
    /// Wi-Fi scan in flight
    Scanning,
    /// Credential provisioning in flight
    Provisioning,
    /// Device accepted and applied the credentials
    Provisioned,
    /// Terminal failure; recover with a fresh create
    Failed,
    /// Device dropped the link; may reconnect without a new create
    Disconnected,
}

impl SessionState {
    /// Whether the device link is up in this state
    pub fn is_linked(&self) -> bool {
        matches!(
            self,
            SessionState::Connected
                | SessionState::Scanning
                | SessionState::Provisioning
                | SessionState::Provisioned
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Created => "created",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Scanning => "scanning",
            SessionState::Provisioning => "provisioning",
            SessionState::Provisioned => "provisioned",
            SessionState::Failed => "failed",
            SessionState::Disconnected => "disconnected",
        };
        write!(f, "{}", s)
    }
}

/// Local transport used to reach the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Device-hosted temporary access point
    #[default]
    SoftAp,
    /// Bluetooth Low Energy
    Ble,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::SoftAp => write!(f, "softap"),
            TransportKind::Ble => write!(f, "ble"),
        }
    }
}

/// Security scheme negotiated with the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityScheme {
    /// Plaintext (security 0)
    Unsecured,
    /// Curve25519 key exchange with proof of possession (security 1)
    #[default]
    Sec1,
    /// SRP6a with username/password (security 2)
    Sec2,
}

impl fmt::Display for SecurityScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityScheme::Unsecured => write!(f, "sec0"),
            SecurityScheme::Sec1 => write!(f, "sec1"),
            SecurityScheme::Sec2 => write!(f, "sec2"),
        }
    }
}

/// Wi-Fi authentication mode reported for a scanned network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WifiSecurity {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
    Wpa3Psk,
    Wpa2Wpa3Psk,
    Unknown(u8),
}

impl WifiSecurity {
    /// Map the numeric auth mode reported by the device
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => WifiSecurity::Open,
            1 => WifiSecurity::Wep,
            2 => WifiSecurity::WpaPsk,
            3 => WifiSecurity::Wpa2Psk,
            4 => WifiSecurity::WpaWpa2Psk,
            5 => WifiSecurity::Wpa2Enterprise,
            6 => WifiSecurity::Wpa3Psk,
            7 => WifiSecurity::Wpa2Wpa3Psk,
            other => WifiSecurity::Unknown(other),
        }
    }

    /// Numeric auth mode
    pub fn code(&self) -> u8 {
        match self {
            WifiSecurity::Open => 0,
            WifiSecurity::Wep => 1,
            WifiSecurity::WpaPsk => 2,
            WifiSecurity::Wpa2Psk => 3,
            WifiSecurity::WpaWpa2Psk => 4,
            WifiSecurity::Wpa2Enterprise => 5,
            WifiSecurity::Wpa3Psk => 6,
            WifiSecurity::Wpa2Wpa3Psk => 7,
            WifiSecurity::Unknown(code) => *code,
        }
    }

    /// Whether joining requires a secret
    pub fn requires_password(&self) -> bool {
        !matches!(self, WifiSecurity::Open)
    }
}

impl fmt::Display for WifiSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WifiSecurity::Open => write!(f, "open"),
            WifiSecurity::Wep => write!(f, "WEP"),
            WifiSecurity::WpaPsk => write!(f, "WPA-PSK"),
            WifiSecurity::Wpa2Psk => write!(f, "WPA2-PSK"),
            WifiSecurity::WpaWpa2Psk => write!(f, "WPA/WPA2-PSK"),
            WifiSecurity::Wpa2Enterprise => write!(f, "WPA2-Enterprise"),
            WifiSecurity::Wpa3Psk => write!(f, "WPA3-PSK"),
            WifiSecurity::Wpa2Wpa3Psk => write!(f, "WPA2/WPA3-PSK"),
            WifiSecurity::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Access point as reported by the transport.
///
/// Some transports fill `password` from their scan cache. It never leaves
/// the orchestrator: callers receive [`WifiNetwork`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String,
    pub rssi: i32,
    pub security: u8,
    pub channel: Option<u8>,
    pub password: Option<String>,
}

impl AccessPoint {
    /// Create an access point with no channel or password information
    pub fn new(ssid: impl Into<String>, rssi: i32, security: u8) -> Self {
        Self {
            ssid: ssid.into(),
            rssi,
            security,
            channel: None,
            password: None,
        }
    }
}

/// Wi-Fi network visible to the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiNetwork {
    pub ssid: String,
    /// Signal strength in dBm
    pub signal_strength: i32,
    pub security: WifiSecurity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
}

impl From<AccessPoint> for WifiNetwork {
    fn from(ap: AccessPoint) -> Self {
        Self {
            ssid: ap.ssid,
            signal_strength: ap.rssi,
            security: WifiSecurity::from_code(ap.security),
            channel: ap.channel,
        }
    }
}

/// Out-of-band connectivity notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityEvent {
    DeviceConnected,
    DeviceDisconnected,
    DeviceConnectionFailed,
}

impl fmt::Display for ConnectivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityEvent::DeviceConnected => write!(f, "device-connected"),
            ConnectivityEvent::DeviceDisconnected => write!(f, "device-disconnected"),
            ConnectivityEvent::DeviceConnectionFailed => write!(f, "device-connection-failed"),
        }
    }
}

/// Reason a device gives for rejecting provisioned credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFailureReason {
    /// The Wi-Fi password was rejected by the access point
    AuthFailed,
    /// The requested SSID was not found
    NetworkNotFound,
    /// The device lost its link while applying credentials
    DeviceDisconnected,
    Unknown,
}

impl fmt::Display for DeviceFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFailureReason::AuthFailed => write!(f, "authentication failed"),
            DeviceFailureReason::NetworkNotFound => write!(f, "network not found"),
            DeviceFailureReason::DeviceDisconnected => write!(f, "device disconnected"),
            DeviceFailureReason::Unknown => write!(f, "unknown reason"),
        }
    }
}
