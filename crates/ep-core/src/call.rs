//! Call surface between a host runtime and the provisioning facade
//!
//! Every operation is a tagged request with one typed result. Over JSON a
//! request looks like `{"op":"connect","ssid":"PROV_1","password":"pw"}` and
//! a response like `{"status":"ok","result":{"type":"connected"}}` or
//! `{"status":"error","error":{"kind":"invalid_state",...}}`.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCategory, ProvisionError};
use crate::types::WifiNetwork;

/// Request from the host runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CallRequest {
    /// Allocate a new device session
    CreateSession,

    /// Join the device's local link
    Connect { ssid: String, password: String },

    /// Store the proof-of-possession secret
    SetProofOfPossession { secret: String },

    /// Read back the proof-of-possession secret
    GetProofOfPossession,

    /// List Wi-Fi networks visible to the device
    ScanNetworks,

    /// Send Wi-Fi credentials to the device
    Provision { ssid: String, password: String },

    /// Exchange application data with the device
    SendCustomData { payload: Vec<u8> },

    /// Whether the device link is up
    GetConnectionStatus,

    /// Open the OS network settings (fire-and-forget)
    OpenSystemNetworkSettings,
}

impl CallRequest {
    /// Operation name as exposed to the host runtime
    pub fn operation(&self) -> &'static str {
        match self {
            CallRequest::CreateSession => "createSession",
            CallRequest::Connect { .. } => "connect",
            CallRequest::SetProofOfPossession { .. } => "setProofOfPossession",
            CallRequest::GetProofOfPossession => "getProofOfPossession",
            CallRequest::ScanNetworks => "scanNetworks",
            CallRequest::Provision { .. } => "provision",
            CallRequest::SendCustomData { .. } => "sendCustomData",
            CallRequest::GetConnectionStatus => "getConnectionStatus",
            CallRequest::OpenSystemNetworkSettings => "openSystemNetworkSettings",
        }
    }
}

/// Response to exactly one [`CallRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallResponse {
    Ok { result: CallResult },
    Error { error: CallError },
}

impl CallResponse {
    /// Whether this is a success response
    pub fn is_ok(&self) -> bool {
        matches!(self, CallResponse::Ok { .. })
    }

    /// Serialize as a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"status":"error","error":{{"kind":"internal","category":"transport","message":"{}"}}}}"#,
                e
            )
        })
    }
}

impl From<Result<CallResult, ProvisionError>> for CallResponse {
    fn from(result: Result<CallResult, ProvisionError>) -> Self {
        match result {
            Ok(result) => CallResponse::Ok { result },
            Err(e) => CallResponse::Error {
                error: CallError::from(&e),
            },
        }
    }
}

/// Request line on a line-oriented bridge.
///
/// The optional `id` is chosen by the host and echoed on the matching
/// [`ReplyEnvelope`], so replies to overlapping calls can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub request: CallRequest,
}

/// Reply line on a line-oriented bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub response: CallResponse,
}

impl ReplyEnvelope {
    pub fn new(id: Option<u64>, response: CallResponse) -> Self {
        Self { id, response }
    }

    /// Reply for a line that could not be parsed as a request
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            id: None,
            response: CallResponse::Error {
                error: CallError {
                    kind: "invalid_request".to_string(),
                    category: ErrorCategory::Caller,
                    message: message.into(),
                    cause: None,
                },
            },
        }
    }

    /// Serialize as a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.response.to_json_line())
    }
}

/// Typed success payload, one variant per operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallResult {
    SessionCreated { message: String },
    Connected,
    ProofOfPossessionSet,
    ProofOfPossession { secret: String },
    Networks { networks: Vec<WifiNetwork> },
    Provisioned { success: bool },
    CustomDataResponse { payload: Vec<u8> },
    ConnectionStatus { device_connected: bool },
    SettingsRequested,
}

/// Failure payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallError {
    /// Stable error code, e.g. `scan_failed`
    pub kind: String,
    pub category: ErrorCategory,
    pub message: String,
    /// Underlying transport cause, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl From<&ProvisionError> for CallError {
    fn from(err: &ProvisionError) -> Self {
        Self {
            kind: err.kind().to_string(),
            category: err.category(),
            message: err.to_string(),
            cause: err.cause().map(|c| c.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::types::{OperationKind, WifiSecurity};

    #[test]
    fn test_request_wire_shape() {
        let req = CallRequest::Connect {
            ssid: "PROV_1".to_string(),
            password: "abcd1234".to_string(),
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""op":"connect""#));

        let decoded: CallRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(decoded.operation(), "connect");
    }

    #[test]
    fn test_unit_request_parses() {
        let req: CallRequest = serde_json::from_str(r#"{"op":"scan_networks"}"#).unwrap();
        assert_eq!(req, CallRequest::ScanNetworks);
        assert_eq!(req.operation(), "scanNetworks");
    }

    #[test]
    fn test_networks_response_shape() {
        let resp = CallResponse::Ok {
            result: CallResult::Networks {
                networks: vec![WifiNetwork {
                    ssid: "home".to_string(),
                    signal_strength: -40,
                    security: WifiSecurity::Wpa2Psk,
                    channel: None,
                }],
            },
        };

        let json = resp.to_json_line();
        assert!(json.contains(r#""status":"ok""#));
        assert!(json.contains(r#""type":"networks""#));
        assert!(json.contains(r#""signalStrength":-40"#));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_error_response_carries_kind_and_cause() {
        let err = ProvisionError::CredentialApplyFailed(TransportError::Rejected(
            "nvs write failed".to_string(),
        ));
        let resp = CallResponse::from(Err::<CallResult, _>(err));

        match resp {
            CallResponse::Error { error } => {
                assert_eq!(error.kind, "credential_apply_failed");
                assert_eq!(error.category, ErrorCategory::Transport);
                assert_eq!(
                    error.cause.as_deref(),
                    Some("Device rejected request: nvs write failed")
                );
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_envelope_id_is_optional() {
        let with_id: CallEnvelope =
            serde_json::from_str(r#"{"id":7,"op":"get_connection_status"}"#).unwrap();
        assert_eq!(with_id.id, Some(7));
        assert_eq!(with_id.request, CallRequest::GetConnectionStatus);

        let without: CallEnvelope =
            serde_json::from_str(r#"{"op":"provision","ssid":"home","password":"pw"}"#).unwrap();
        assert_eq!(without.id, None);
        assert_eq!(without.request.operation(), "provision");
    }

    #[test]
    fn test_reply_echoes_id() {
        let reply = ReplyEnvelope::new(
            Some(3),
            CallResponse::Ok {
                result: CallResult::ConnectionStatus {
                    device_connected: true,
                },
            },
        );

        let json = reply.to_json_line();
        assert!(json.contains(r#""id":3"#));
        assert!(json.contains(r#""status":"ok""#));
        assert!(json.contains(r#""device_connected":true"#));
    }

    #[test]
    fn test_invalid_request_reply() {
        let json = ReplyEnvelope::invalid_request("expected value").to_json_line();
        assert!(json.contains(r#""kind":"invalid_request""#));
        assert!(json.contains(r#""category":"caller""#));
        assert!(!json.contains(r#""id""#));
    }

    #[test]
    fn test_caller_error_has_no_cause() {
        let err = ProvisionError::AlreadyPending(OperationKind::Provision);
        let error = CallError::from(&err);
        assert_eq!(error.category, ErrorCategory::Caller);
        assert!(error.cause.is_none());

        let json = serde_json::to_string(&error).unwrap();
        assert!(!json.contains("cause"));
    }
}
