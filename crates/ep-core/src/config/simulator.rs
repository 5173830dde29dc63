//! Simulated device configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;
use crate::types::{AccessPoint, DeviceFailureReason};

/// Configuration for the in-process simulated device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// SSID of the device's SoftAP / BLE advertised name
    pub device_name: String,

    /// Password of the device's SoftAP. `None` accepts any password.
    pub device_password: Option<String>,

    /// Proof of possession the device expects. `None` disables the check.
    pub proof_of_possession: Option<String>,

    /// Networks the device reports when scanning, in report order
    pub networks: Vec<SimulatedNetwork>,

    /// Delay before each callback or event fires
    #[serde(with = "duration_millis")]
    pub latency: Duration,

    /// Random extra delay as a fraction of `latency` (0.0 to 1.0)
    pub latency_jitter: f64,

    /// Inject a failure at one stage of the workflow
    pub fail_at: Option<FailurePoint>,

    /// Prefix the device prepends when echoing custom data
    pub echo_prefix: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            device_name: "PROV_3C61F0".to_string(),
            device_password: None,
            proof_of_possession: None,
            networks: vec![
                SimulatedNetwork::new("home-2g", -42, 3, 6),
                SimulatedNetwork::new("office", -67, 4, 11),
                SimulatedNetwork::new("guest", -58, 0, 1),
            ],
            latency: Duration::from_millis(50),
            latency_jitter: 0.0,
            fail_at: None,
            echo_prefix: "ack:".to_string(),
        }
    }
}

/// A network the simulated device can see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedNetwork {
    pub ssid: String,
    pub rssi: i32,
    /// Numeric auth mode (0 = open, 3 = WPA2-PSK, ...)
    pub security: u8,
    #[serde(default)]
    pub channel: u8,
}

impl SimulatedNetwork {
    /// Create a simulated network entry
    pub fn new(ssid: impl Into<String>, rssi: i32, security: u8, channel: u8) -> Self {
        Self {
            ssid: ssid.into(),
            rssi,
            security,
            channel,
        }
    }
}

impl From<&SimulatedNetwork> for AccessPoint {
    fn from(net: &SimulatedNetwork) -> Self {
        AccessPoint {
            ssid: net.ssid.clone(),
            rssi: net.rssi,
            security: net.security,
            channel: Some(net.channel),
            password: None,
        }
    }
}

/// Workflow stage at which the simulated device fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum FailurePoint {
    /// Device handle cannot be built
    Construction,
    /// Link never comes up
    Connect,
    Scan,
    SessionCreation,
    CredentialSend,
    CredentialApply,
    /// Device rejects the credentials with a reason
    Device { reason: DeviceFailureReason },
    Provision,
    CustomData,
    /// Requests are accepted but never answered
    Silent,
}
