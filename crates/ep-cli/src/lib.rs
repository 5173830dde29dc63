//! ep-provision: Command-line interface and host bridge
//!
//! Provides the `ep-provision` CLI for driving a provisioning run from the
//! terminal and for exposing the provisioning calls to a host runtime over
//! JSON lines.

pub mod commands;
pub mod output;
