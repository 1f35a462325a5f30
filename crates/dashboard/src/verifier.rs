use std::time::Duration;

use fairsoil_types::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const WORLD_ID_MISSING_FIELDS: &str = "Missing address/appId/actionId.";
pub const WORLD_ID_INVALID_BODY: &str = "Invalid request body.";
pub const WORLD_ID_NOT_CONFIGURED: &str = "World ID verifier not configured.";

const WORLD_ID_REJECTED: &str = "The verifier did not accept this proof.";
const ZK_NFC_REJECTED: &str = "Please re-check your NFC proof.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifierError {
    #[error("Verifier unreachable. {0}")]
    Unreachable(String),
    #[error("Verification failed. {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifierKind {
    WorldId,
    ZkNfc,
}

impl VerifierKind {
    /// Action name shown while the verifier call is in flight.
    pub fn action_name(self) -> &'static str {
        match self {
            Self::WorldId => "worldIdVerify",
            Self::ZkNfc => "zknfcVerify",
        }
    }

    pub fn accepted_message(self) -> &'static str {
        match self {
            Self::WorldId => "World ID verification accepted.",
            Self::ZkNfc => "ZK-NFC verification accepted.",
        }
    }

    fn rejected_fallback(self) -> &'static str {
        match self {
            Self::WorldId => WORLD_ID_REJECTED,
            Self::ZkNfc => ZK_NFC_REJECTED,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldIdVerifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ZkNfcVerifyRequest {
    address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerifyResponse {
    fn refused(message: &str) -> Self {
        Self {
            verified: false,
            message: Some(message.to_string()),
        }
    }
}

/// Local World ID endpoint: validates the payload and answers with a
/// placeholder until a real verifier is wired in.
pub fn world_id_proxy(body: &[u8]) -> (u16, VerifyResponse) {
    let Ok(request) = serde_json::from_slice::<WorldIdVerifyRequest>(body) else {
        return (400, VerifyResponse::refused(WORLD_ID_INVALID_BODY));
    };
    let present = |field: &Option<String>| field.as_deref().is_some_and(|value| !value.is_empty());
    if !present(&request.address) || !present(&request.app_id) || !present(&request.action_id) {
        return (400, VerifyResponse::refused(WORLD_ID_MISSING_FIELDS));
    }
    (501, VerifyResponse::refused(WORLD_ID_NOT_CONFIGURED))
}

/// Posts proofs to external verifiers. A missing World ID URL routes the
/// request through [`world_id_proxy`].
#[derive(Debug, Clone)]
pub struct VerifierClient {
    http: reqwest::Client,
    world_id_url: Option<String>,
    zk_nfc_url: Option<String>,
}

impl VerifierClient {
    pub fn new(
        world_id_url: Option<String>,
        zk_nfc_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| format!("failed to build verifier HTTP client: {error}"))?;
        Ok(Self {
            http,
            world_id_url,
            zk_nfc_url,
        })
    }

    pub async fn verify_world_id(
        &self,
        address: Address,
        app_id: &str,
        action_id: &str,
    ) -> Result<(), VerifierError> {
        let request = WorldIdVerifyRequest {
            address: Some(address.to_checksum(None)),
            app_id: Some(app_id.to_string()),
            action_id: Some(action_id.to_string()),
        };
        let (status, response) = match self.world_id_url.as_deref() {
            Some(url) => self.post(url, &request).await?,
            None => {
                let body = serde_json::to_vec(&request).map_err(|error| {
                    VerifierError::Unreachable(format!("failed to encode request: {error}"))
                })?;
                world_id_proxy(&body)
            }
        };
        interpret(VerifierKind::WorldId, status, response)
    }

    pub async fn verify_zk_nfc(&self, address: Address) -> Result<(), VerifierError> {
        let url = self
            .zk_nfc_url
            .as_deref()
            .ok_or_else(|| VerifierError::Unreachable("ZK-NFC verifier URL missing.".to_string()))?;
        let request = ZkNfcVerifyRequest {
            address: address.to_checksum(None),
        };
        let (status, response) = self.post(url, &request).await?;
        interpret(VerifierKind::ZkNfc, status, response)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<(u16, VerifyResponse), VerifierError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|error| {
                warn!(%error, "verifier request failed");
                VerifierError::Unreachable(format!("Network error from verifier ({error})"))
            })?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Ok((status, VerifyResponse::default()));
        }
        let parsed = response.json::<VerifyResponse>().await.map_err(|error| {
            VerifierError::Rejected(format!("unreadable verifier response: {error}"))
        })?;
        debug!(status, verified = parsed.verified, "verifier answered");
        Ok((status, parsed))
    }
}

fn interpret(kind: VerifierKind, status: u16, response: VerifyResponse) -> Result<(), VerifierError> {
    if !(200..300).contains(&status) {
        return Err(VerifierError::Unreachable(format!(
            "Network error from verifier ({status})"
        )));
    }
    if response.verified {
        return Ok(());
    }
    let message = response
        .message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| kind.rejected_fallback().to_string());
    Err(VerifierError::Rejected(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_rejects_malformed_and_incomplete_payloads() {
        let (status, response) = world_id_proxy(b"not json");
        assert_eq!(status, 400);
        assert_eq!(response.message.as_deref(), Some(WORLD_ID_INVALID_BODY));

        let (status, response) = world_id_proxy(br#"{"address":"0xabc","appId":""}"#);
        assert_eq!(status, 400);
        assert_eq!(response.message.as_deref(), Some(WORLD_ID_MISSING_FIELDS));
        assert!(!response.verified);

        let (status, response) =
            world_id_proxy(br#"{"address":"0xabc","appId":"app","actionId":"act"}"#);
        assert_eq!(status, 501);
        assert_eq!(response.message.as_deref(), Some(WORLD_ID_NOT_CONFIGURED));
    }

    #[test]
    fn non_success_status_reads_as_unreachable() {
        let error = interpret(VerifierKind::ZkNfc, 502, VerifyResponse::default())
            .expect_err("bad gateway");
        assert_eq!(
            error.to_string(),
            "Verifier unreachable. Network error from verifier (502)"
        );
    }

    #[test]
    fn unverified_answer_reads_as_rejection() {
        let error = interpret(VerifierKind::ZkNfc, 200, VerifyResponse::default())
            .expect_err("not verified");
        assert_eq!(
            error.to_string(),
            "Verification failed. Please re-check your NFC proof."
        );
        let error = interpret(
            VerifierKind::WorldId,
            200,
            VerifyResponse::refused("nullifier already used"),
        )
        .expect_err("refused");
        assert_eq!(error.to_string(), "Verification failed. nullifier already used");
        assert_eq!(
            interpret(
                VerifierKind::WorldId,
                200,
                VerifyResponse {
                    verified: true,
                    message: None
                }
            ),
            Ok(())
        );
    }

    #[tokio::test]
    async fn world_id_without_url_uses_local_placeholder() {
        let client = VerifierClient::new(None, None, Duration::from_secs(1)).expect("client");
        let error = client
            .verify_world_id(Address::with_last_byte(1), "app", "act")
            .await
            .expect_err("placeholder is not a verifier");
        assert_eq!(
            error,
            VerifierError::Unreachable("Network error from verifier (501)".to_string())
        );
        let error = client
            .verify_zk_nfc(Address::with_last_byte(1))
            .await
            .expect_err("no url");
        assert!(matches!(error, VerifierError::Unreachable(_)));
    }
}
