//! Device session
//!
//! One provisioning attempt against one device: the transport handle, the
//! proof-of-possession secret and the last known link status. A session is
//! replaced wholesale by the next create; it is never reused.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ep_core::traits::DeviceTransport;
use ep_core::types::DeviceId;

/// State of a single device session
pub struct DeviceSession {
    id: DeviceId,
    generation: u64,
    transport: Arc<dyn DeviceTransport>,
    proof_of_possession: Option<String>,
    device_connected: bool,
    created_at: Instant,
}

impl DeviceSession {
    /// Wrap a freshly created transport handle
    pub fn new(id: DeviceId, generation: u64, transport: Arc<dyn DeviceTransport>) -> Self {
        Self {
            id,
            generation,
            transport,
            proof_of_possession: None,
            device_connected: false,
            created_at: Instant::now(),
        }
    }

    /// Device identifier assigned by the host
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Monotonic counter, bumped on every create
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Shared handle to the transport
    pub fn transport(&self) -> Arc<dyn DeviceTransport> {
        Arc::clone(&self.transport)
    }

    /// Stored proof-of-possession secret, empty if never set
    pub fn proof_of_possession(&self) -> &str {
        self.proof_of_possession.as_deref().unwrap_or("")
    }

    pub fn set_proof_of_possession(&mut self, secret: impl Into<String>) {
        self.proof_of_possession = Some(secret.into());
    }

    /// Last link status reported by the event channel
    pub fn is_device_connected(&self) -> bool {
        self.device_connected
    }

    pub fn set_device_connected(&mut self, connected: bool) {
        self.device_connected = connected;
    }

    /// Time since the session was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Forget the secret and hand back the transport for disconnection.
    ///
    /// The caller must disconnect outside any lock it holds, since the
    /// transport may publish events synchronously.
    pub fn teardown(mut self) -> Arc<dyn DeviceTransport> {
        self.proof_of_possession = None;
        self.device_connected = false;
        self.transport
    }
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field(
                "proof_of_possession",
                &self.proof_of_possession.as_ref().map(|_| "<redacted>"),
            )
            .field("device_connected", &self.device_connected)
            .finish()
    }
}
