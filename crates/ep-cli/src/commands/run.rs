//! Run command: provision one device end to end

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;

use crate::output::{format_networks, print_info, print_success, print_warning};
use ep_core::config::ConfigFile;
use ep_orchestrator::SessionOrchestrator;
use ep_sim::SimulatedDeviceFactory;

/// Options for a single provisioning run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// SoftAP SSID or BLE name of the device
    pub device_ssid: String,
    pub device_password: String,
    pub pop: Option<String>,
    /// Network the device should join
    pub ssid: Option<String>,
    pub password: String,
    /// Stop after listing networks
    pub scan_only: bool,
    /// Payload to exchange on the custom-data endpoint after connecting
    pub custom_data: Option<String>,
}

/// Create, connect, scan and provision against the simulated device
pub async fn run_command(config: ConfigFile, options: RunOptions) -> Result<()> {
    let factory = Arc::new(SimulatedDeviceFactory::new(config.simulator));
    let orchestrator = SessionOrchestrator::new(config.orchestrator, factory);

    let result = drive(&orchestrator, options).await;
    orchestrator.close();
    result
}

async fn drive(orchestrator: &SessionOrchestrator, options: RunOptions) -> Result<()> {
    let device = orchestrator.create_session()?;
    tracing::debug!(%device, "Session ready");

    if let Some(pop) = &options.pop {
        orchestrator.set_proof_of_possession(pop)?;
    }

    print_info(&format!("Connecting to {}...", options.device_ssid));
    orchestrator
        .connect(&options.device_ssid, &options.device_password)
        .await
        .with_context(|| format!("Failed to connect to {}", options.device_ssid))?;
    print_success(&format!("Connected to {}", options.device_ssid));

    if let Some(payload) = &options.custom_data {
        let response = orchestrator
            .send_custom_data(Bytes::from(payload.clone().into_bytes()))
            .await
            .context("Custom data exchange failed")?;
        print_info(&format!(
            "Device replied: {}",
            String::from_utf8_lossy(&response)
        ));
    }

    let networks = orchestrator
        .scan_networks()
        .await
        .context("Failed to scan for networks")?;
    println!("{}", format_networks(&networks));

    if options.scan_only {
        return Ok(());
    }

    let ssid = options
        .ssid
        .ok_or_else(|| anyhow::anyhow!("--ssid is required unless --scan-only is given"))?;
    if !networks.iter().any(|n| n.ssid == ssid) {
        print_warning(&format!("{} was not seen in the scan", ssid));
    }

    print_info(&format!("Sending credentials for {}...", ssid));
    orchestrator
        .provision(&ssid, &options.password)
        .await
        .with_context(|| format!("Failed to provision {}", ssid))?;
    print_success(&format!("Provisioned: device joined {}", ssid));

    Ok(())
}
