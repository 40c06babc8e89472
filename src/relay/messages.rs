//! Relay message types

use serde::{Deserialize, Serialize};

use crate::types::{RelayError, Result};
use crate::wallet::WalletAddress;

/// Wallet request as consumed from the creation queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationRequest {
    /// Caller-defined JSON body
    pub payload: Vec<u8>,
    /// Token echoed on the reply
    pub correlation_id: Option<String>,
    /// Queue the new address is replied to
    pub reply_to: Option<String>,
}

impl CreationRequest {
    /// Parse the caller's payload; it travels with the scan job
    pub fn parse_payload(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| RelayError::Payload(format!("Request body is not JSON: {e}")))
    }

    /// Correlation id for log lines
    pub fn correlation(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or("<none>")
    }
}

/// Job for the wallet scanner: watch `wallet` from `scan_height` on
///
/// Serialized as `{ "wallet": ..., "scanHeight": ..., "request": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub wallet: WalletAddress,
    pub scan_height: u64,
    pub request: serde_json::Value,
}

impl ScanRequest {
    pub fn new(wallet: WalletAddress, scan_height: u64, request: serde_json::Value) -> Self {
        Self {
            wallet,
            scan_height,
            request,
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Into::into)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::KeyPair;
    use serde_json::json;

    fn wallet() -> WalletAddress {
        WalletAddress {
            address: "TRTLabc".to_string(),
            spend: KeyPair {
                private_key: "01".to_string(),
                public_key: "02".to_string(),
            },
            view: KeyPair {
                private_key: "03".to_string(),
                public_key: "04".to_string(),
            },
        }
    }

    #[test]
    fn test_scan_request_wire_format() {
        let scan = ScanRequest::new(wallet(), 1_500_000, json!({"amount": 100}));
        let value: serde_json::Value = serde_json::from_slice(&scan.to_bytes().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "wallet": {
                    "address": "TRTLabc",
                    "spend": {"privateKey": "01", "publicKey": "02"},
                    "view": {"privateKey": "03", "publicKey": "04"}
                },
                "scanHeight": 1500000,
                "request": {"amount": 100}
            })
        );
    }

    #[test]
    fn test_payload_must_be_json() {
        let request = CreationRequest {
            payload: b"not json".to_vec(),
            correlation_id: None,
            reply_to: Some("q1".to_string()),
        };
        assert!(matches!(request.parse_payload(), Err(RelayError::Payload(_))));
        assert_eq!(request.correlation(), "<none>");
    }

    #[test]
    fn test_any_json_payload_accepted() {
        let request = CreationRequest {
            payload: b"[1, \"two\", null]".to_vec(),
            correlation_id: Some("abc".to_string()),
            reply_to: None,
        };
        assert_eq!(request.parse_payload().unwrap(), json!([1, "two", null]));
    }
}
