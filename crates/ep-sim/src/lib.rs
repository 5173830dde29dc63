//! ep-sim: Simulated provisioning device
//!
//! An in-process device that speaks the transport traits the orchestrator
//! drives. It answers asynchronously from tokio tasks, publishes link
//! changes on the connectivity event channel and can be told to fail at any
//! stage of the workflow. Used by the CLI and by tests in place of a radio.

pub mod device;
pub mod factory;
pub mod latency;

pub use device::SimulatedDevice;
pub use factory::SimulatedDeviceFactory;
pub use latency::LatencyModel;
