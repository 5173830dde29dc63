//! Simulated provisioning device
//!
//! Behaves like a vendor SDK device handle: every entry point returns at
//! once, and the outcome arrives later from a spawned task, through the
//! request's listener or, for `connect`, on the event channel.

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use ep_core::config::{FailurePoint, SimulatorConfig};
use ep_core::traits::{DeviceTransport, ExchangeOutcome, Listener, ProvisionSignal, ScanOutcome};
use ep_core::types::{
    AccessPoint, ConnectivityEvent, DeviceFailureReason, SecurityScheme, TransportKind,
    WifiSecurity,
};
use ep_core::{EventChannel, TransportError};

use crate::latency::LatencyModel;

/// In-process stand-in for a SoftAP or BLE provisioning device
pub struct SimulatedDevice {
    config: Arc<SimulatorConfig>,
    events: EventChannel,
    transport: TransportKind,
    security: SecurityScheme,
    latency: LatencyModel,
    connected: Arc<AtomicBool>,
    proof_of_possession: Mutex<Option<String>>,
    /// Cancelled on disconnect so queued callbacks never fire
    cancel: Mutex<CancellationToken>,
}

impl SimulatedDevice {
    pub fn new(
        config: Arc<SimulatorConfig>,
        events: EventChannel,
        transport: TransportKind,
        security: SecurityScheme,
    ) -> Self {
        let latency = LatencyModel::from_config(&config);
        Self {
            config,
            events,
            transport,
            security,
            latency,
            connected: Arc::new(AtomicBool::new(false)),
            proof_of_possession: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn security(&self) -> SecurityScheme {
        self.security
    }

    /// Whether the simulated link is up
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn fails_at(&self, point: FailurePoint) -> bool {
        self.config.fail_at == Some(point)
    }

    fn is_silent(&self) -> bool {
        self.fails_at(FailurePoint::Silent)
    }

    fn require_link(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TransportError::Closed)
        }
    }

    /// Deliver `steps` to `listener` one by one, each after the latency
    fn play<T>(&self, listener: Listener<T>, steps: Vec<T>) -> Result<(), TransportError>
    where
        T: Send + 'static,
    {
        let handle = runtime()?;
        let cancel = self.cancel.lock().clone();
        let latency = self.latency;

        handle.spawn(async move {
            for step in steps {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::trace!("Simulated callbacks cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(latency.next_delay()) => listener(step),
                }
            }
        });
        Ok(())
    }

    /// Publish a connectivity event after the latency
    fn publish_later(&self, event: ConnectivityEvent) -> Result<(), TransportError> {
        let handle = runtime()?;
        let cancel = self.cancel.lock().clone();
        let delay = self.latency.next_delay();
        let events = self.events.clone();
        let connected = Arc::clone(&self.connected);

        handle.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    connected.store(event == ConnectivityEvent::DeviceConnected, Ordering::SeqCst);
                    tracing::debug!(%event, "Simulated device event");
                    events.publish(event);
                }
            }
        });
        Ok(())
    }

    /// Signals the device emits for one provisioning attempt
    fn provision_script(&self, ssid: &str, password: &str) -> Vec<ProvisionSignal> {
        let mut steps = Vec::new();

        if let Some(reason) = self.session_failure() {
            steps.push(ProvisionSignal::SessionCreationFailed(reason));
            return steps;
        }

        if self.fails_at(FailurePoint::CredentialSend) {
            steps.push(ProvisionSignal::CredentialsSendFailed(TransportError::Other(
                "config write timed out".to_string(),
            )));
            return steps;
        }
        steps.push(ProvisionSignal::CredentialsSent);

        if self.fails_at(FailurePoint::CredentialApply) {
            steps.push(ProvisionSignal::CredentialsApplyFailed(
                TransportError::Rejected("config apply rejected".to_string()),
            ));
            return steps;
        }
        steps.push(ProvisionSignal::CredentialsApplied);

        if let Some(reason) = self.join_failure(ssid, password) {
            steps.push(ProvisionSignal::DeviceFailure(reason));
            return steps;
        }

        if self.fails_at(FailurePoint::Provision) {
            steps.push(ProvisionSignal::Failed(TransportError::Other(
                "status poll failed".to_string(),
            )));
            return steps;
        }

        steps.push(ProvisionSignal::Succeeded);
        steps
    }

    fn session_failure(&self) -> Option<TransportError> {
        if self.fails_at(FailurePoint::SessionCreation) {
            return Some(TransportError::Security("handshake aborted".to_string()));
        }
        if self.security == SecurityScheme::Unsecured {
            return None;
        }

        let expected = self.config.proof_of_possession.as_deref()?;
        let supplied = self.proof_of_possession.lock().clone();
        if supplied.as_deref() != Some(expected) {
            return Some(TransportError::Security(
                "proof of possession mismatch".to_string(),
            ));
        }
        None
    }

    /// Outcome of the device trying to join the target network
    fn join_failure(&self, ssid: &str, password: &str) -> Option<DeviceFailureReason> {
        if let Some(FailurePoint::Device { reason }) = self.config.fail_at {
            return Some(reason);
        }

        let Some(network) = self.config.networks.iter().find(|n| n.ssid == ssid) else {
            return Some(DeviceFailureReason::NetworkNotFound);
        };
        if WifiSecurity::from_code(network.security).requires_password() && password.is_empty() {
            return Some(DeviceFailureReason::AuthFailed);
        }
        None
    }
}

impl DeviceTransport for SimulatedDevice {
    fn connect(&self, ssid: &str, password: &str) -> Result<(), TransportError> {
        tracing::debug!(ssid, transport = %self.transport, "Simulated connect");
        if self.is_silent() {
            return Ok(());
        }

        let wrong_name = ssid != self.config.device_name;
        let wrong_password = self.transport == TransportKind::SoftAp
            && self
                .config
                .device_password
                .as_deref()
                .is_some_and(|expected| expected != password);

        if wrong_name || wrong_password || self.fails_at(FailurePoint::Connect) {
            self.publish_later(ConnectivityEvent::DeviceConnectionFailed)
        } else {
            self.publish_later(ConnectivityEvent::DeviceConnected)
        }
    }

    fn set_proof_of_possession(&self, secret: &str) {
        *self.proof_of_possession.lock() = Some(secret.to_string());
    }

    fn scan_networks(&self, listener: Listener<ScanOutcome>) -> Result<(), TransportError> {
        self.require_link()?;
        if self.is_silent() {
            return Ok(());
        }

        let outcome = if self.fails_at(FailurePoint::Scan) {
            ScanOutcome::Failed(TransportError::Other("scan aborted by device".to_string()))
        } else {
            ScanOutcome::Networks(self.config.networks.iter().map(AccessPoint::from).collect())
        };
        self.play(listener, vec![outcome])
    }

    fn provision(
        &self,
        ssid: &str,
        password: &str,
        listener: Listener<ProvisionSignal>,
    ) -> Result<(), TransportError> {
        self.require_link()?;
        if self.is_silent() {
            return Ok(());
        }

        let steps = self.provision_script(ssid, password);
        self.play(listener, steps)
    }

    fn send_custom_data(
        &self,
        endpoint: &str,
        payload: Bytes,
        listener: Listener<ExchangeOutcome>,
    ) -> Result<(), TransportError> {
        self.require_link()?;
        if self.is_silent() {
            return Ok(());
        }

        let outcome = if self.fails_at(FailurePoint::CustomData) {
            ExchangeOutcome::Failed(TransportError::Rejected(format!(
                "endpoint {} not registered",
                endpoint
            )))
        } else {
            let mut response = BytesMut::with_capacity(self.config.echo_prefix.len() + payload.len());
            response.put_slice(self.config.echo_prefix.as_bytes());
            response.put_slice(&payload);
            ExchangeOutcome::Response(response.freeze())
        };
        self.play(listener, vec![outcome])
    }

    fn disconnect(&self) {
        let previous = std::mem::replace(&mut *self.cancel.lock(), CancellationToken::new());
        previous.cancel();
        self.connected.store(false, Ordering::SeqCst);
        tracing::debug!("Simulated device disconnected");
    }
}

fn runtime() -> Result<Handle, TransportError> {
    Handle::try_current()
        .map_err(|_| TransportError::Other("simulated device needs a tokio runtime".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ep_core::config::SimulatedNetwork;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn device(config: SimulatorConfig, events: &EventChannel) -> SimulatedDevice {
        SimulatedDevice::new(
            Arc::new(SimulatorConfig {
                latency: Duration::from_millis(1),
                ..config
            }),
            events.clone(),
            TransportKind::SoftAp,
            SecurityScheme::Sec1,
        )
    }

    fn collect<T: Send + 'static>() -> (Listener<T>, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener: Listener<T> = Arc::new(move |value| {
            let _ = tx.send(value);
        });
        (listener, rx)
    }

    async fn connect(device: &SimulatedDevice, events: &EventChannel) -> ConnectivityEvent {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = events.subscribe(Arc::new(move |event| {
            let _ = tx.send(event);
        }));
        device.connect("PROV_3C61F0", "any").unwrap();
        rx.recv().await.unwrap()
    }

    #[tokio::test]
    async fn test_connect_publishes_event() {
        let events = EventChannel::new();
        let device = device(SimulatorConfig::default(), &events);

        assert_eq!(
            connect(&device, &events).await,
            ConnectivityEvent::DeviceConnected
        );
        assert!(device.is_connected());
    }

    #[tokio::test]
    async fn test_wrong_softap_password_fails_connect() {
        let events = EventChannel::new();
        let device = device(
            SimulatorConfig {
                device_password: Some("abcd1234".to_string()),
                ..Default::default()
            },
            &events,
        );

        assert_eq!(
            connect(&device, &events).await,
            ConnectivityEvent::DeviceConnectionFailed
        );
        assert!(!device.is_connected());
    }

    #[tokio::test]
    async fn test_requests_need_link() {
        let events = EventChannel::new();
        let device = device(SimulatorConfig::default(), &events);
        let (listener, _rx) = collect::<ScanOutcome>();

        assert_eq!(
            device.scan_networks(listener).unwrap_err(),
            TransportError::Closed
        );
    }

    #[tokio::test]
    async fn test_scan_reports_configured_networks_in_order() {
        let events = EventChannel::new();
        let device = device(
            SimulatorConfig {
                networks: vec![
                    SimulatedNetwork::new("b", -70, 3, 1),
                    SimulatedNetwork::new("a", -30, 0, 6),
                ],
                ..Default::default()
            },
            &events,
        );
        connect(&device, &events).await;

        let (listener, mut rx) = collect();
        device.scan_networks(listener).unwrap();
        match rx.recv().await.unwrap() {
            ScanOutcome::Networks(aps) => {
                let names: Vec<_> = aps.iter().map(|ap| ap.ssid.as_str()).collect();
                assert_eq!(names, ["b", "a"]);
            }
            other => panic!("Unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provision_success_script() {
        let events = EventChannel::new();
        let device = device(SimulatorConfig::default(), &events);
        connect(&device, &events).await;

        let (listener, mut rx) = collect();
        device.provision("home-2g", "hunter22", listener).unwrap();

        assert!(matches!(rx.recv().await, Some(ProvisionSignal::CredentialsSent)));
        assert!(matches!(rx.recv().await, Some(ProvisionSignal::CredentialsApplied)));
        assert!(matches!(rx.recv().await, Some(ProvisionSignal::Succeeded)));
    }

    #[tokio::test]
    async fn test_pop_mismatch_fails_session_creation() {
        let events = EventChannel::new();
        let device = device(
            SimulatorConfig {
                proof_of_possession: Some("abcd1234".to_string()),
                ..Default::default()
            },
            &events,
        );
        connect(&device, &events).await;
        device.set_proof_of_possession("wrong");

        let (listener, mut rx) = collect();
        device.provision("home-2g", "hunter22", listener).unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(ProvisionSignal::SessionCreationFailed(TransportError::Security(_)))
        ));
    }

    #[tokio::test]
    async fn test_unknown_network_is_device_failure() {
        let events = EventChannel::new();
        let device = device(SimulatorConfig::default(), &events);
        connect(&device, &events).await;

        let (listener, mut rx) = collect();
        device.provision("nowhere", "pw", listener).unwrap();
        let last = loop {
            let signal = rx.recv().await.unwrap();
            if signal.is_terminal() {
                break signal;
            }
        };
        assert!(matches!(
            last,
            ProvisionSignal::DeviceFailure(DeviceFailureReason::NetworkNotFound)
        ));
    }

    #[tokio::test]
    async fn test_custom_data_is_echoed_with_prefix() {
        let events = EventChannel::new();
        let device = device(SimulatorConfig::default(), &events);
        connect(&device, &events).await;

        let (listener, mut rx) = collect();
        device
            .send_custom_data("custom-data", Bytes::from_static(b"ping"), listener)
            .unwrap();
        match rx.recv().await.unwrap() {
            ExchangeOutcome::Response(data) => assert_eq!(&data[..], b"ack:ping"),
            other => panic!("Unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnect_cancels_queued_callbacks() {
        let events = EventChannel::new();
        let device = SimulatedDevice::new(
            Arc::new(SimulatorConfig {
                latency: Duration::from_millis(200),
                ..Default::default()
            }),
            events.clone(),
            TransportKind::SoftAp,
            SecurityScheme::Sec1,
        );
        device.connected.store(true, Ordering::SeqCst);

        let (listener, mut rx) = collect::<ScanOutcome>();
        device.scan_networks(listener).unwrap();
        device.disconnect();

        // The spawned task drops its listener without calling it
        assert!(rx.recv().await.is_none());
        assert!(!device.is_connected());
    }

    #[test]
    fn test_requests_outside_runtime_fail() {
        let events = EventChannel::new();
        let device = device(SimulatorConfig::default(), &events);
        assert!(matches!(
            device.connect("PROV_3C61F0", "pw"),
            Err(TransportError::Other(_))
        ));
    }
}
