//! Provisioning facade
//!
//! The surface a host runtime calls. Each [`CallRequest`] yields exactly one
//! [`CallResponse`]; failures carry a stable `kind` code and the underlying
//! cause instead of a single generic error.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use ep_core::call::{CallRequest, CallResponse, CallResult};
use ep_core::traits::SettingsLauncher;
use ep_core::ProvisionError;

use crate::orchestrator::SessionOrchestrator;

/// Something that answers host calls
#[async_trait]
pub trait CallHandler: Send + Sync {
    /// Handle one request. Never fails: errors become error responses.
    async fn dispatch(&self, request: CallRequest) -> CallResponse;
}

/// Host-facing entry point over a [`SessionOrchestrator`]
#[derive(Clone)]
pub struct ProvisioningFacade {
    orchestrator: SessionOrchestrator,
    settings: Arc<dyn SettingsLauncher>,
}

impl ProvisioningFacade {
    pub fn new(orchestrator: SessionOrchestrator, settings: Arc<dyn SettingsLauncher>) -> Self {
        Self {
            orchestrator,
            settings,
        }
    }

    pub fn orchestrator(&self) -> &SessionOrchestrator {
        &self.orchestrator
    }

    /// Run a request and return its typed result
    pub async fn execute(&self, request: CallRequest) -> Result<CallResult, ProvisionError> {
        match request {
            CallRequest::CreateSession => {
                let device = self.orchestrator.create_session()?;
                Ok(CallResult::SessionCreated {
                    message: format!("Device session {} created", device),
                })
            }
            CallRequest::Connect { ssid, password } => {
                self.orchestrator.connect(&ssid, &password).await?;
                Ok(CallResult::Connected)
            }
            CallRequest::SetProofOfPossession { secret } => {
                self.orchestrator.set_proof_of_possession(&secret)?;
                Ok(CallResult::ProofOfPossessionSet)
            }
            CallRequest::GetProofOfPossession => Ok(CallResult::ProofOfPossession {
                secret: self.orchestrator.proof_of_possession(),
            }),
            CallRequest::ScanNetworks => {
                let networks = self.orchestrator.scan_networks().await?;
                Ok(CallResult::Networks { networks })
            }
            CallRequest::Provision { ssid, password } => {
                self.orchestrator.provision(&ssid, &password).await?;
                Ok(CallResult::Provisioned { success: true })
            }
            CallRequest::SendCustomData { payload } => {
                let response = self
                    .orchestrator
                    .send_custom_data(Bytes::from(payload))
                    .await?;
                Ok(CallResult::CustomDataResponse {
                    payload: response.to_vec(),
                })
            }
            CallRequest::GetConnectionStatus => Ok(CallResult::ConnectionStatus {
                device_connected: self.orchestrator.is_connected(),
            }),
            CallRequest::OpenSystemNetworkSettings => {
                if let Err(e) = self.settings.open_network_settings() {
                    tracing::warn!("Failed to open network settings: {}", e);
                }
                Ok(CallResult::SettingsRequested)
            }
        }
    }
}

#[async_trait]
impl CallHandler for ProvisioningFacade {
    async fn dispatch(&self, request: CallRequest) -> CallResponse {
        let operation = request.operation();
        tracing::debug!(operation, "Dispatching call");

        let result = self.execute(request).await;
        if let Err(e) = &result {
            tracing::warn!(operation, kind = e.kind(), "Call failed: {}", e);
        }
        CallResponse::from(result)
    }
}

impl std::fmt::Debug for ProvisioningFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningFacade")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}
