//! ep-orchestrator: Provisioning session orchestration
//!
//! Drives a single device through create, connect, scan, provision and
//! custom-data exchange. The transport reports outcomes through callbacks and
//! a global connectivity event channel; the orchestrator turns them into one
//! awaitable, typed result per call and keeps the session state machine
//! consistent while doing so.

pub mod bridge;
pub mod facade;
pub mod orchestrator;
pub mod registry;
pub mod session;
pub mod settings;

pub use bridge::{BridgeStats, LineBridge};
pub use facade::{CallHandler, ProvisioningFacade};
pub use orchestrator::SessionOrchestrator;
pub use registry::{Completion, CompletionRegistry, PendingCompletion};
pub use session::DeviceSession;
pub use settings::CommandSettingsLauncher;
