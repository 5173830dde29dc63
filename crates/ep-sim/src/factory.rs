//! Simulated transport factory

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ep_core::config::{FailurePoint, SimulatorConfig};
use ep_core::traits::{DeviceTransport, TransportFactory};
use ep_core::types::{SecurityScheme, TransportKind};
use ep_core::{EventChannel, TransportError};

use crate::device::SimulatedDevice;

/// Builds [`SimulatedDevice`] handles that share one configuration
pub struct SimulatedDeviceFactory {
    config: Arc<SimulatorConfig>,
    events: EventChannel,
    created: AtomicU64,
}

impl SimulatedDeviceFactory {
    /// Factory whose devices publish on the process-wide event channel
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_event_channel(config, EventChannel::global().clone())
    }

    pub fn with_event_channel(config: SimulatorConfig, events: EventChannel) -> Self {
        Self {
            config: Arc::new(config),
            events,
            created: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Number of device handles built so far
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }
}

impl TransportFactory for SimulatedDeviceFactory {
    fn create_device(
        &self,
        transport: TransportKind,
        security: SecurityScheme,
    ) -> Result<Arc<dyn DeviceTransport>, TransportError> {
        if self.config.fail_at == Some(FailurePoint::Construction) {
            return Err(TransportError::Construction(format!(
                "{} transport unavailable",
                transport
            )));
        }

        let count = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            device = %self.config.device_name,
            %transport,
            %security,
            count,
            "Creating simulated device"
        );

        Ok(Arc::new(SimulatedDevice::new(
            Arc::clone(&self.config),
            self.events.clone(),
            transport,
            security,
        )))
    }
}
