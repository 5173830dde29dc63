//! Bridge command: serve provisioning calls as JSON lines on stdin/stdout

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use ep_core::config::ConfigFile;
use ep_orchestrator::{CommandSettingsLauncher, LineBridge, ProvisioningFacade, SessionOrchestrator};
use ep_sim::SimulatedDeviceFactory;

/// Serve until stdin closes or Ctrl+C
pub async fn bridge_command(config: ConfigFile) -> Result<()> {
    let settings = Arc::new(CommandSettingsLauncher::from_config(&config.orchestrator));
    let factory = Arc::new(SimulatedDeviceFactory::new(config.simulator));
    let orchestrator = SessionOrchestrator::new(config.orchestrator, factory);
    let facade = Arc::new(ProvisioningFacade::new(orchestrator.clone(), settings));

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, stopping bridge");
            ctrl_c.cancel();
        }
    });

    tracing::info!("Bridge ready on stdin/stdout");
    let result = LineBridge::new(facade)
        .with_shutdown_token(shutdown)
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await;
    orchestrator.close();

    let stats = result?;
    tracing::info!(
        requests = stats.requests,
        invalid = stats.invalid,
        replies = stats.replies,
        "Bridge finished"
    );
    Ok(())
}
