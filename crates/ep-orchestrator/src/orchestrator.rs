//! Session orchestrator
//!
//! Turns the transport's callback-and-event protocol into one awaitable
//! result per call. Every operation follows the same shape:
//!
//! 1. Under the lock: check the state, register a pending completion and
//!    move to the in-flight state.
//! 2. Outside the lock: issue the transport request.
//! 3. Await the completion, bounded by the configured timeout.
//!
//! Transport listeners and connectivity events resolve completions under
//! the same lock, so a state change and the completion it settles can never
//! be observed apart. Nothing calls into the transport while holding the
//! lock, because the transport may call back synchronously.
//!
//! # State machine
//!
//! ```text
//! Uninitialized --create--> Created --connect--> Connecting --event--> Connected
//! Connected --scan--> Scanning --result--> Connected
//! Connected --provision--> Provisioning --success--> Provisioned
//! Connecting | Scanning | Provisioning --failure or timeout--> Failed
//! any linked state --disconnected event--> Disconnected --connected event--> Connected
//! any state --create--> Created     any state --close--> Uninitialized
//! ```

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ep_core::config::OrchestratorConfig;
use ep_core::traits::{
    DeviceTransport, ExchangeOutcome, Listener, ProvisionSignal, ScanOutcome, TransportFactory,
};
use ep_core::types::{
    ConnectivityEvent, CorrelationId, DeviceId, OperationKind, SessionState, WifiNetwork,
};
use ep_core::{EventChannel, ProvisionError, Subscription, TransportError};

use crate::registry::{
    Completion, CompletionReceiver, CompletionRegistry, CompletionResult, PendingCompletion,
};
use crate::session::DeviceSession;

/// Set while some orchestrator listens on the process-wide channel
static GLOBAL_LISTENER: AtomicBool = AtomicBool::new(false);

/// Exclusive right to listen on the process-wide channel, released on drop
struct GlobalClaim;

impl GlobalClaim {
    fn acquire() -> Option<Self> {
        GLOBAL_LISTENER
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GlobalClaim)
    }
}

impl Drop for GlobalClaim {
    fn drop(&mut self) {
        GLOBAL_LISTENER.store(false, Ordering::Release);
    }
}

/// Event channel registration plus the global claim backing it, if any
struct Listening {
    _subscription: Subscription,
    _claim: Option<GlobalClaim>,
}

/// Everything guarded by the single orchestrator lock
struct Inner {
    state: SessionState,
    session: Option<DeviceSession>,
    registry: CompletionRegistry,
    listening: Option<Listening>,
    generation: u64,
}

struct Shared {
    config: OrchestratorConfig,
    factory: Arc<dyn TransportFactory>,
    events: EventChannel,
    inner: Mutex<Inner>,
}

/// An operation that passed its state check and owns a pending completion
struct Admitted {
    transport: Arc<dyn DeviceTransport>,
    generation: u64,
    correlation: CorrelationId,
    receiver: CompletionReceiver,
}

/// Drives one device session at a time.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SessionOrchestrator {
    shared: Arc<Shared>,
}

impl SessionOrchestrator {
    /// Create an orchestrator listening on the process-wide event channel.
    ///
    /// Only one orchestrator per process may listen there at a time: while
    /// one holds a session, [`create_session`](Self::create_session) on any
    /// other fails with [`ProvisionError::Initialization`] until the first is
    /// closed or dropped.
    pub fn new(config: OrchestratorConfig, factory: Arc<dyn TransportFactory>) -> Self {
        Self::with_event_channel(config, factory, EventChannel::global().clone())
    }

    /// Create an orchestrator listening on a specific event channel
    pub fn with_event_channel(
        config: OrchestratorConfig,
        factory: Arc<dyn TransportFactory>,
        events: EventChannel,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                factory,
                events,
                inner: Mutex::new(Inner {
                    state: SessionState::Uninitialized,
                    session: None,
                    registry: CompletionRegistry::new(),
                    listening: None,
                    generation: 0,
                }),
            }),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.shared.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    /// Identifier of the current session, if any
    pub fn device_id(&self) -> Option<DeviceId> {
        self.shared
            .inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.id().clone())
    }

    /// Last link status reported by the event channel
    pub fn is_connected(&self) -> bool {
        self.shared
            .inner
            .lock()
            .session
            .as_ref()
            .is_some_and(|s| s.is_device_connected())
    }

    /// Kinds with an outstanding completion
    pub fn pending_operations(&self) -> Vec<OperationKind> {
        self.shared.inner.lock().registry.pending_kinds()
    }

    /// Whether this orchestrator holds an event channel subscription
    pub fn is_subscribed(&self) -> bool {
        self.shared.inner.lock().listening.is_some()
    }

    /// Allocate a fresh device session, replacing any existing one.
    ///
    /// Completions pending on the old session are rejected with
    /// [`ProvisionError::SessionReplaced`]. If the transport handle cannot be
    /// built, or another orchestrator already listens on the process-wide
    /// channel, the existing session is left untouched.
    pub fn create_session(&self) -> Result<DeviceId, ProvisionError> {
        let config = &self.shared.config;
        let transport = self
            .shared
            .factory
            .create_device(config.transport, config.security)
            .map_err(|e| {
                tracing::error!(error = %e, transport = %config.transport, "Failed to create device handle");
                ProvisionError::Initialization(e)
            })?;

        let (id, previous) = {
            let mut inner = self.shared.inner.lock();

            if inner.listening.is_none() {
                match self.listen() {
                    Some(listening) => inner.listening = Some(listening),
                    None => {
                        drop(inner);
                        transport.disconnect();
                        tracing::error!(
                            "Another orchestrator already listens on the process-wide event channel"
                        );
                        return Err(ProvisionError::Initialization(TransportError::Other(
                            "event channel already has an orchestrator".to_string(),
                        )));
                    }
                }
            }

            let abandoned = inner.registry.reject_all(ProvisionError::SessionReplaced);
            if abandoned > 0 {
                tracing::warn!(abandoned, "Pending operations abandoned by new session");
            }

            inner.generation += 1;
            let id = DeviceId::new(format!("device-{}", inner.generation));
            let session = DeviceSession::new(id.clone(), inner.generation, transport);
            let previous = inner.session.replace(session);
            inner.state = SessionState::Created;
            (id, previous)
        };

        if let Some(previous) = previous {
            tracing::debug!(device = %previous.id(), "Disconnecting replaced session");
            previous.teardown().disconnect();
        }

        tracing::info!(
            device = %id,
            transport = %config.transport,
            security = %config.security,
            "Device session created"
        );
        Ok(id)
    }

    /// Join the device's local link and wait for the connected event
    pub async fn connect(&self, ssid: &str, password: &str) -> Result<(), ProvisionError> {
        let kind = OperationKind::Connect;
        let admitted = self.admit(
            kind,
            "connect",
            &[SessionState::Created, SessionState::Disconnected],
        )?;

        tracing::info!(ssid, "Connecting to device");
        if let Err(e) = admitted.transport.connect(ssid, password) {
            if self
                .shared
                .abandon(kind, admitted.correlation, SessionState::Failed)
            {
                tracing::error!(error = %e, "Connect request could not be issued");
                return Err(ProvisionError::ConnectionFailed(Some(e)));
            }
        }

        // Connect events carry no correlation. If the session was replaced
        // while the request was being issued, drop the link it may open.
        if self.shared.current_generation() != Some(admitted.generation) {
            tracing::debug!(
                generation = admitted.generation,
                "Session replaced during connect, dropping stale link"
            );
            admitted.transport.disconnect();
        }

        match self.wait(kind, admitted).await? {
            Completion::Connected => Ok(()),
            other => Err(unexpected(kind, other)),
        }
    }

    /// Store the proof-of-possession secret and forward it to the transport
    pub fn set_proof_of_possession(&self, secret: &str) -> Result<(), ProvisionError> {
        let transport = {
            let mut inner = self.shared.inner.lock();
            let state = inner.state;
            match inner.session.as_mut() {
                Some(session) => {
                    session.set_proof_of_possession(secret);
                    session.transport()
                }
                None => {
                    return Err(ProvisionError::InvalidState {
                        operation: "set proof of possession",
                        state,
                    })
                }
            }
        };

        transport.set_proof_of_possession(secret);
        tracing::debug!("Proof of possession stored");
        Ok(())
    }

    /// Stored proof-of-possession secret, empty if unset
    pub fn proof_of_possession(&self) -> String {
        self.shared
            .inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.proof_of_possession().to_string())
            .unwrap_or_default()
    }

    /// List Wi-Fi networks visible to the device, in the order reported
    pub async fn scan_networks(&self) -> Result<Vec<WifiNetwork>, ProvisionError> {
        let kind = OperationKind::Scan;
        let admitted = self.admit(kind, "scan networks", &[SessionState::Connected])?;

        tracing::info!("Scanning for Wi-Fi networks");
        let listener = self.shared.listener(admitted.correlation, Shared::on_scan);
        if let Err(e) = admitted.transport.scan_networks(listener) {
            if self
                .shared
                .abandon(kind, admitted.correlation, SessionState::Connected)
            {
                tracing::error!(error = %e, "Scan request could not be issued");
                return Err(ProvisionError::ScanFailed(e));
            }
        }

        match self.wait(kind, admitted).await? {
            Completion::Networks(networks) => Ok(networks),
            other => Err(unexpected(kind, other)),
        }
    }

    /// Send Wi-Fi credentials and wait for the device to apply them
    pub async fn provision(&self, ssid: &str, password: &str) -> Result<(), ProvisionError> {
        let kind = OperationKind::Provision;
        let admitted = self.admit(kind, "provision", &[SessionState::Connected])?;

        tracing::info!(ssid, "Provisioning device");
        let listener = self
            .shared
            .listener(admitted.correlation, Shared::on_provision);
        if let Err(e) = admitted.transport.provision(ssid, password, listener) {
            if self
                .shared
                .abandon(kind, admitted.correlation, SessionState::Connected)
            {
                tracing::error!(error = %e, "Provision request could not be issued");
                return Err(ProvisionError::ProvisioningFailed(e));
            }
        }

        match self.wait(kind, admitted).await? {
            Completion::Provisioned => Ok(()),
            other => Err(unexpected(kind, other)),
        }
    }

    /// Exchange application data on the configured endpoint
    pub async fn send_custom_data(&self, payload: Bytes) -> Result<Bytes, ProvisionError> {
        let kind = OperationKind::CustomData;
        let admitted = self.admit(kind, "send custom data", &[SessionState::Connected])?;

        let endpoint = self.shared.config.custom_endpoint.as_str();
        tracing::debug!(endpoint, len = payload.len(), "Sending custom data");
        let listener = self
            .shared
            .listener(admitted.correlation, Shared::on_exchange);
        if let Err(e) = admitted
            .transport
            .send_custom_data(endpoint, payload, listener)
        {
            if self
                .shared
                .abandon(kind, admitted.correlation, SessionState::Connected)
            {
                tracing::error!(error = %e, "Custom data request could not be issued");
                return Err(ProvisionError::CustomDataFailed(e));
            }
        }

        match self.wait(kind, admitted).await? {
            Completion::CustomData(response) => Ok(response),
            other => Err(unexpected(kind, other)),
        }
    }

    /// Tear down the session and stop listening for events.
    ///
    /// Pending completions are rejected with [`ProvisionError::SessionClosed`].
    pub fn close(&self) {
        let (session, listening) = {
            let mut inner = self.shared.inner.lock();
            let abandoned = inner.registry.reject_all(ProvisionError::SessionClosed);
            if abandoned > 0 {
                tracing::warn!(abandoned, "Pending operations abandoned by close");
            }
            inner.state = SessionState::Uninitialized;
            (inner.session.take(), inner.listening.take())
        };

        drop(listening);
        if let Some(session) = session {
            tracing::info!(device = %session.id(), "Closing device session");
            session.teardown().disconnect();
        }
    }

    /// Subscribe to the event channel, claiming it first if it is global
    fn listen(&self) -> Option<Listening> {
        let claim = if self.shared.events.is_global() {
            Some(GlobalClaim::acquire()?)
        } else {
            None
        };

        let weak = Arc::downgrade(&self.shared);
        let subscription = self.shared.events.subscribe(Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.on_event(event);
            }
        }));
        Some(Listening {
            _subscription: subscription,
            _claim: claim,
        })
    }

    /// Check state, register the completion and enter the in-flight state
    fn admit(
        &self,
        kind: OperationKind,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> Result<Admitted, ProvisionError> {
        let mut inner = self.shared.inner.lock();

        if inner.registry.is_pending(kind) {
            return Err(ProvisionError::AlreadyPending(kind));
        }

        let state = inner.state;
        let (transport, generation) = match inner.session.as_ref() {
            Some(session) if allowed.contains(&state) => (session.transport(), session.generation()),
            _ => {
                tracing::debug!(operation, %state, "Operation rejected by session state");
                return Err(ProvisionError::InvalidState { operation, state });
            }
        };

        let (pending, receiver) = PendingCompletion::new(kind);
        let correlation = inner.registry.register(pending)?;
        if let Some((in_flight, _)) = lifecycle(kind) {
            inner.state = in_flight;
        }

        Ok(Admitted {
            transport,
            generation,
            correlation,
            receiver,
        })
    }

    /// Await a completion, bounded by the timeout for its kind
    async fn wait(&self, kind: OperationKind, admitted: Admitted) -> CompletionResult {
        let Admitted {
            correlation,
            mut receiver,
            ..
        } = admitted;
        let after = self.shared.config.timeout_for(kind);

        match tokio::time::timeout(after, &mut receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ProvisionError::SessionClosed(kind)),
            Err(_) => {
                if self.shared.abandon(kind, correlation, SessionState::Failed) {
                    tracing::warn!(%kind, %correlation, ?after, "Pending completion timed out");
                    Err(ProvisionError::Timeout { kind, after })
                } else {
                    // Settled between the deadline and the lock
                    receiver
                        .try_recv()
                        .unwrap_or(Err(ProvisionError::SessionClosed(kind)))
                }
            }
        }
    }
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("SessionOrchestrator")
            .field("state", &inner.state)
            .field("session", &inner.session)
            .field("pending", &inner.registry.pending_kinds())
            .finish()
    }
}

impl Shared {
    fn current_generation(&self) -> Option<u64> {
        self.inner.lock().session.as_ref().map(|s| s.generation())
    }

    /// Build a transport listener bound to one completion
    fn listener<T, F>(self: &Arc<Self>, correlation: CorrelationId, handle: F) -> Listener<T>
    where
        T: 'static,
        F: Fn(&Shared, CorrelationId, T) + Send + Sync + 'static,
    {
        let weak = Arc::downgrade(self);
        Arc::new(move |value| match weak.upgrade() {
            Some(shared) => handle(&shared, correlation, value),
            None => tracing::trace!(%correlation, "Listener fired after orchestrator dropped"),
        })
    }

    fn on_event(&self, event: ConnectivityEvent) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let state = inner.state;
        let Some(session) = inner.session.as_mut() else {
            tracing::trace!(%event, "Connectivity event without a session");
            return;
        };

        match event {
            ConnectivityEvent::DeviceConnected => {
                session.set_device_connected(true);
                match state {
                    SessionState::Connecting => {
                        inner.state = SessionState::Connected;
                        inner
                            .registry
                            .resolve(OperationKind::Connect, Completion::Connected);
                        tracing::info!("Device connected");
                    }
                    SessionState::Disconnected => {
                        inner.state = SessionState::Connected;
                        tracing::info!("Device reconnected");
                    }
                    _ => tracing::debug!(%state, "Connected event leaves state unchanged"),
                }
            }
            ConnectivityEvent::DeviceDisconnected => {
                session.set_device_connected(false);
                if state.is_linked() {
                    inner.state = SessionState::Disconnected;
                    tracing::warn!(was = %state, "Device disconnected");
                }
            }
            ConnectivityEvent::DeviceConnectionFailed => {
                if inner.registry.reject(
                    OperationKind::Connect,
                    ProvisionError::ConnectionFailed(None),
                ) {
                    if inner.state == SessionState::Connecting {
                        inner.state = SessionState::Failed;
                    }
                    tracing::error!("Device connection failed");
                } else {
                    tracing::debug!("Connection failure event with no pending connect");
                }
            }
        }
    }

    fn on_scan(&self, correlation: CorrelationId, outcome: ScanOutcome) {
        let result = match outcome {
            ScanOutcome::Networks(access_points) => {
                let networks = access_points
                    .into_iter()
                    .map(|ap| {
                        if ap.password.is_some() {
                            tracing::warn!(ssid = %ap.ssid, "Dropping password field from scan record");
                        }
                        WifiNetwork::from(ap)
                    })
                    .collect::<Vec<_>>();
                tracing::info!(count = networks.len(), "Scan completed");
                Ok(Completion::Networks(networks))
            }
            ScanOutcome::Failed(e) => Err(ProvisionError::ScanFailed(e)),
        };
        self.settle(OperationKind::Scan, correlation, result);
    }

    fn on_provision(&self, correlation: CorrelationId, signal: ProvisionSignal) {
        let result = match signal {
            ProvisionSignal::CredentialsSent => {
                tracing::info!("Credentials sent to device");
                return;
            }
            ProvisionSignal::CredentialsApplied => {
                tracing::info!("Device applied credentials");
                return;
            }
            ProvisionSignal::Succeeded => Ok(Completion::Provisioned),
            ProvisionSignal::SessionCreationFailed(e) => {
                Err(ProvisionError::SessionCreationFailed(e))
            }
            ProvisionSignal::CredentialsSendFailed(e) => {
                Err(ProvisionError::CredentialSendFailed(e))
            }
            ProvisionSignal::CredentialsApplyFailed(e) => {
                Err(ProvisionError::CredentialApplyFailed(e))
            }
            ProvisionSignal::DeviceFailure(reason) => {
                Err(ProvisionError::DeviceReportedFailure(reason))
            }
            ProvisionSignal::Failed(e) => Err(ProvisionError::ProvisioningFailed(e)),
        };
        self.settle(OperationKind::Provision, correlation, result);
    }

    fn on_exchange(&self, correlation: CorrelationId, outcome: ExchangeOutcome) {
        let result = match outcome {
            ExchangeOutcome::Response(data) => Ok(Completion::CustomData(data)),
            ExchangeOutcome::Failed(e) => Err(ProvisionError::CustomDataFailed(e)),
        };
        self.settle(OperationKind::CustomData, correlation, result);
    }

    /// Deliver a listener result and apply the matching state transition
    fn settle(&self, kind: OperationKind, correlation: CorrelationId, result: CompletionResult) {
        let failure = result.as_ref().err().map(ToString::to_string);
        let mut inner = self.inner.lock();

        let delivered = match result {
            Ok(value) => inner.registry.resolve_matching(kind, correlation, value),
            Err(error) => inner.registry.reject_matching(kind, correlation, error),
        };
        if !delivered {
            tracing::debug!(%kind, %correlation, "Stale completion signal ignored");
            return;
        }

        if let Some((in_flight, settled)) = lifecycle(kind) {
            if inner.state == in_flight {
                inner.state = if failure.is_none() {
                    settled
                } else {
                    SessionState::Failed
                };
            }
        }

        match failure {
            Some(message) => tracing::error!(%kind, %correlation, "{}", message),
            None => tracing::debug!(%kind, %correlation, "Operation completed"),
        }
    }

    /// Drop a pending completion without settling it.
    ///
    /// Returns false if it was already settled. Otherwise the in-flight state
    /// (if still current) becomes `fallback`.
    fn abandon(
        &self,
        kind: OperationKind,
        correlation: CorrelationId,
        fallback: SessionState,
    ) -> bool {
        let mut inner = self.inner.lock();
        if inner.registry.take(kind, correlation).is_none() {
            return false;
        }
        if let Some((in_flight, _)) = lifecycle(kind) {
            if inner.state == in_flight {
                inner.state = fallback;
            }
        }
        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.listening.take();
        if let Some(session) = inner.session.take() {
            session.teardown().disconnect();
        }
    }
}

/// State held while an operation is in flight, and the state it settles into
fn lifecycle(kind: OperationKind) -> Option<(SessionState, SessionState)> {
    match kind {
        OperationKind::Connect => Some((SessionState::Connecting, SessionState::Connected)),
        OperationKind::Scan => Some((SessionState::Scanning, SessionState::Connected)),
        OperationKind::Provision => Some((SessionState::Provisioning, SessionState::Provisioned)),
        OperationKind::CustomData => None,
    }
}

fn unexpected(kind: OperationKind, completion: Completion) -> ProvisionError {
    tracing::error!(%kind, ?completion, "Completion settled with another kind's payload");
    let cause = TransportError::Other(format!("unexpected {} completion", kind));
    match kind {
        OperationKind::Connect => ProvisionError::ConnectionFailed(Some(cause)),
        OperationKind::Scan => ProvisionError::ScanFailed(cause),
        OperationKind::Provision => ProvisionError::ProvisioningFailed(cause),
        OperationKind::CustomData => ProvisionError::CustomDataFailed(cause),
    }
}
