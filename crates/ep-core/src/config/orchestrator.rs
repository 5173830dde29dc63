//! Orchestrator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::types::{OperationKind, SecurityScheme, TransportKind};

/// Configuration for the session orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Local transport used to reach the device
    pub transport: TransportKind,

    /// Security scheme for the provisioning session
    pub security: SecurityScheme,

    /// Per-operation completion timeouts
    pub timeouts: TimeoutConfig,

    /// Device endpoint that receives custom data
    pub custom_endpoint: String,

    /// Command used to open the system network settings.
    /// Empty means the platform default.
    pub settings_command: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::SoftAp,
            security: SecurityScheme::Sec1,
            timeouts: TimeoutConfig::default(),
            custom_endpoint: "custom-data".to_string(),
            settings_command: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Timeout applied to a pending completion of the given kind
    pub fn timeout_for(&self, kind: OperationKind) -> Duration {
        match kind {
            OperationKind::Connect => self.timeouts.connect,
            OperationKind::Scan => self.timeouts.scan,
            OperationKind::Provision => self.timeouts.provision,
            OperationKind::CustomData => self.timeouts.custom_data,
        }
    }
}

/// How long each kind of pending completion may stay unresolved
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "duration_secs")]
    pub connect: Duration,

    #[serde(with = "duration_secs")]
    pub scan: Duration,

    /// Provisioning includes the device joining the target network
    #[serde(with = "duration_secs")]
    pub provision: Duration,

    #[serde(with = "duration_secs")]
    pub custom_data: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            scan: Duration::from_secs(20),
            provision: Duration::from_secs(60),
            custom_data: Duration::from_secs(15),
        }
    }
}
