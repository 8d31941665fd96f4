// src/agent/client.rs
//! REST client for the remote credential agent.
//!
//! Stateless translation layer: each operation issues one HTTP call
//! against the agent's admin API and maps the response. A non-success
//! status is a hard failure (`Error::AgentUnavailable`), never a retry
//! point; retry policy belongs to whoever drives the OIDC flow.

use std::time::Duration;

use log::debug;
use serde_json::{json, Value};

use crate::agent::models::{
    CreatePresentationResponse, InvitationRecord, PresentationRecord, WalletDid,
};
use crate::agent::tenancy::TenancyHeaders;
use crate::error::{Error, Result};

const WALLET_DID_PATH: &str = "/wallet/did";
const PUBLIC_WALLET_DID_PATH: &str = "/wallet/did/public";
const CREATE_PRESENTATION_REQUEST_PATH: &str = "/present-proof-2.0/create-request";
const PRESENT_PROOF_RECORDS_PATH: &str = "/present-proof-2.0/records";
const OOB_CREATE_INVITATION_PATH: &str = "/out-of-band/create-invitation";

/// Client for the credential agent's admin API.
///
/// Constructed once per process with a per-call timeout and a tenancy
/// header provider; shared across authentication attempts via `Arc`.
pub struct AgentClient {
    admin_url: String,
    invitation_label: String,
    http: reqwest::Client,
    tenancy: Box<dyn TenancyHeaders>,
}

impl AgentClient {
    /// Creates a new agent client.
    ///
    /// # Arguments
    /// * `admin_url` - Base URL of the agent admin API, without trailing slash
    /// * `invitation_label` - Label wallets display for invitations
    /// * `call_timeout` - Per-call HTTP timeout, distinct from the
    ///   attempt-level presentation deadline
    /// * `tenancy` - Header provider selected for the deployment's tenancy mode
    pub fn new(
        admin_url: String,
        invitation_label: String,
        call_timeout: Duration,
        tenancy: Box<dyn TenancyHeaders>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        Ok(AgentClient {
            admin_url,
            invitation_label,
            http,
            tenancy,
        })
    }

    /// Asks the agent to create a present-proof request from the
    /// configured proof requirements.
    pub async fn create_presentation_request(
        &self,
        proof_config: &Value,
    ) -> Result<CreatePresentationResponse> {
        debug!(">>> create_presentation_request");
        let payload = json!({ "presentation_request": { "indy": proof_config } });

        let resp = self
            .http
            .post(format!("{}{}", self.admin_url, CREATE_PRESENTATION_REQUEST_PATH))
            .headers(self.tenancy.headers().await?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::AgentUnavailable(e.to_string()))?;

        let record: Value = Self::success_json(resp).await?;
        let result = CreatePresentationResponse::from_value(record)?;

        debug!("<<< create_presentation_request");
        Ok(result)
    }

    /// Fetches the raw exchange record for the orchestrator to interpret.
    pub async fn get_presentation_record(&self, pres_ex_id: &str) -> Result<PresentationRecord> {
        debug!(">>> get_presentation_record");
        let resp = self
            .http
            .get(format!(
                "{}{}/{}",
                self.admin_url, PRESENT_PROOF_RECORDS_PATH, pres_ex_id
            ))
            .headers(self.tenancy.headers().await?)
            .send()
            .await
            .map_err(|e| Error::AgentUnavailable(e.to_string()))?;

        let record: Value = Self::success_json(resp).await?;
        let record: PresentationRecord = serde_json::from_value(record)
            .map_err(|e| Error::AgentUnavailable(format!("malformed record: {}", e)))?;

        debug!("<<< get_presentation_record -> {}", record.state);
        Ok(record)
    }

    /// Checks one revocation registry for revocations affecting the
    /// presented credential.
    ///
    /// A response without a `revoked` field means nothing has been revoked
    /// from the registry yet and yields `false`; this permissive default
    /// mirrors the agent's contract rather than treating absence as an
    /// error.
    pub async fn is_revoked(&self, rev_reg_id: &str) -> Result<bool> {
        debug!(">>> is_revoked");
        let resp = self
            .http
            .get(format!(
                "{}/revocation/registry/{}/issued/indy_recs",
                self.admin_url, rev_reg_id
            ))
            .headers(self.tenancy.headers().await?)
            .send()
            .await
            .map_err(|e| Error::AgentUnavailable(e.to_string()))?;

        let body: Value = Self::success_json(resp).await?;
        let revoked = body
            .pointer("/rev_reg_delta/value/revoked")
            .and_then(Value::as_array)
            .map(|entries| !entries.is_empty())
            .unwrap_or(false);

        debug!("<<< is_revoked -> {}", revoked);
        Ok(revoked)
    }

    /// Returns the agent's public DID, or the first locally managed wallet
    /// DID when `public` is false. "First wallet DID" is the operative
    /// contract for local lookups.
    pub async fn get_wallet_did(&self, public: bool) -> Result<WalletDid> {
        debug!(">>> get_wallet_did");
        let path = if public {
            PUBLIC_WALLET_DID_PATH
        } else {
            WALLET_DID_PATH
        };

        let resp = self
            .http
            .get(format!("{}{}", self.admin_url, path))
            .headers(self.tenancy.headers().await?)
            .send()
            .await
            .map_err(|e| Error::AgentUnavailable(e.to_string()))?;

        let body: Value = Self::success_json(resp).await?;
        let payload = if public {
            body.get("result").cloned()
        } else {
            body.get("results")
                .and_then(Value::as_array)
                .and_then(|results| results.first())
                .cloned()
        }
        .ok_or_else(|| Error::AgentUnavailable("wallet did response missing payload".into()))?;

        let did: WalletDid = serde_json::from_value(payload)
            .map_err(|e| Error::AgentUnavailable(format!("malformed wallet did: {}", e)))?;

        debug!("<<< get_wallet_did -> {}", did.did);
        Ok(did)
    }

    /// Wraps a presentation exchange in an out-of-band invitation carrying
    /// it as a single `present-proof` attachment.
    pub async fn create_oob_invitation(
        &self,
        exchange: &Value,
        use_public_did: bool,
    ) -> Result<InvitationRecord> {
        debug!(">>> create_oob_invitation");
        let pres_ex_id = exchange
            .get("pres_ex_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::AgentUnavailable("exchange missing pres_ex_id".into()))?;

        let payload = json!({
            "attachments": [
                {
                    "id": pres_ex_id,
                    "type": "present-proof",
                    "data": { "json": exchange },
                }
            ],
            "use_public_did": use_public_did,
            "my_label": self.invitation_label,
        });

        let resp = self
            .http
            .post(format!("{}{}", self.admin_url, OOB_CREATE_INVITATION_PATH))
            .headers(self.tenancy.headers().await?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::AgentUnavailable(e.to_string()))?;

        let body: Value = Self::success_json(resp).await?;
        let invitation: InvitationRecord = serde_json::from_value(body)
            .map_err(|e| Error::AgentUnavailable(format!("malformed invitation: {}", e)))?;

        debug!("<<< create_oob_invitation");
        Ok(invitation)
    }

    /// Requires a success status and a JSON body; anything else is an
    /// `AgentUnavailable` carrying the status and raw body for logging.
    async fn success_json(resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::AgentUnavailable(format!("{}::{}", status, body)));
        }
        resp.json()
            .await
            .map_err(|e| Error::AgentUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tenancy::SingleTenant;
    use serde_json::json;

    /// Client pointed at the mock server under a test-unique path prefix,
    /// so parallel tests never race on the shared mock state.
    fn client(prefix: &str) -> AgentClient {
        AgentClient::new(
            format!("{}{}", mockito::server_url(), prefix),
            "vc-authn".into(),
            Duration::from_secs(5),
            Box::new(SingleTenant::new(None)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_presentation_request_returns_exchange_handle() {
        let _m = mockito::mock("POST", "/cpr/present-proof-2.0/create-request")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"pres_ex_id": "exch-1", "state": "request-sent"}"#)
            .create();

        let result = client("/cpr")
            .create_presentation_request(&json!({"requested_attributes": {}}))
            .await
            .unwrap();
        assert_eq!(result.pres_ex_id, "exch-1");
        assert_eq!(result.record["state"], "request-sent");
    }

    #[tokio::test]
    async fn create_presentation_request_fails_on_server_error() {
        let _m = mockito::mock("POST", "/cpr500/present-proof-2.0/create-request")
            .with_status(500)
            .with_body("boom")
            .create();

        let err = client("/cpr500")
            .create_presentation_request(&json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AgentUnavailable(_)));
    }

    #[tokio::test]
    async fn get_presentation_record_maps_fields() {
        let _m = mockito::mock("GET", "/rec/present-proof-2.0/records/exch-2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"pres_ex_id": "exch-2", "state": "done", "verified": "true",
                    "by_format": {"pres": {"indy": {"identifiers": []}}}}"#,
            )
            .create();

        let record = client("/rec").get_presentation_record("exch-2").await.unwrap();
        assert!(record.presentation_received());
        assert_eq!(record.verified_flag(), Some(true));
    }

    #[tokio::test]
    async fn get_presentation_record_fails_on_not_found() {
        let _m = mockito::mock("GET", "/rec404/present-proof-2.0/records/missing")
            .with_status(404)
            .with_body("not found")
            .create();

        let err = client("/rec404")
            .get_presentation_record("missing")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AgentUnavailable(_)));
    }

    #[tokio::test]
    async fn is_revoked_defaults_to_false_when_field_missing() {
        let _m = mockito::mock("GET", "/rev-none/revocation/registry/reg-1/issued/indy_recs")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"rev_reg_delta": {"value": {}}}"#)
            .create();

        assert!(!client("/rev-none").is_revoked("reg-1").await.unwrap());
    }

    #[tokio::test]
    async fn is_revoked_true_when_entries_present() {
        let _m = mockito::mock("GET", "/rev-hit/revocation/registry/reg-2/issued/indy_recs")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"rev_reg_delta": {"value": {"revoked": [1, 4]}}}"#)
            .create();

        assert!(client("/rev-hit").is_revoked("reg-2").await.unwrap());
    }

    #[tokio::test]
    async fn is_revoked_false_when_list_empty() {
        let _m = mockito::mock("GET", "/rev-empty/revocation/registry/reg-3/issued/indy_recs")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"rev_reg_delta": {"value": {"revoked": []}}}"#)
            .create();

        assert!(!client("/rev-empty").is_revoked("reg-3").await.unwrap());
    }

    #[tokio::test]
    async fn is_revoked_fails_on_server_error() {
        let _m = mockito::mock("GET", "/rev500/revocation/registry/reg-4/issued/indy_recs")
            .with_status(500)
            .with_body("boom")
            .create();

        let err = client("/rev500").is_revoked("reg-4").await.unwrap_err();
        assert!(matches!(err, Error::AgentUnavailable(_)));
    }

    #[tokio::test]
    async fn get_wallet_did_fails_on_server_error() {
        let _m = mockito::mock("GET", "/did500/wallet/did/public")
            .with_status(503)
            .with_body("unavailable")
            .create();

        let err = client("/did500").get_wallet_did(true).await.unwrap_err();
        assert!(matches!(err, Error::AgentUnavailable(_)));
    }

    #[tokio::test]
    async fn get_wallet_did_public_reads_result() {
        let _m = mockito::mock("GET", "/did-pub/wallet/did/public")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": {"did": "did:sov:pub", "verkey": "vk"}}"#)
            .create();

        let did = client("/did-pub").get_wallet_did(true).await.unwrap();
        assert_eq!(did.did, "did:sov:pub");
    }

    #[tokio::test]
    async fn get_wallet_did_local_takes_first_entry() {
        let _m = mockito::mock("GET", "/did-local/wallet/did")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results": [{"did": "did:sov:first"}, {"did": "did:sov:second"}]}"#,
            )
            .create();

        let did = client("/did-local").get_wallet_did(false).await.unwrap();
        assert_eq!(did.did, "did:sov:first");
    }

    #[tokio::test]
    async fn create_oob_invitation_packages_single_attachment() {
        let _m = mockito::mock("POST", "/oob/out-of-band/create-invitation")
            .match_body(mockito::Matcher::PartialJson(json!({
                "attachments": [{"id": "exch-3", "type": "present-proof"}],
                "use_public_did": false,
                "my_label": "vc-authn",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"invitation_url": "https://agent.example/inv?oob=abc",
                    "invitation": {"@type": "out-of-band/1.1/invitation"},
                    "invi_msg_id": "inv-1"}"#,
            )
            .create();

        let exchange = json!({"pres_ex_id": "exch-3", "state": "request-sent"});
        let invitation = client("/oob")
            .create_oob_invitation(&exchange, false)
            .await
            .unwrap();
        assert_eq!(invitation.invitation_url, "https://agent.example/inv?oob=abc");
        assert_eq!(invitation.invi_msg_id.as_deref(), Some("inv-1"));
    }

    #[tokio::test]
    async fn oob_invitation_fails_on_unauthorized() {
        let _m = mockito::mock("POST", "/oob401/out-of-band/create-invitation")
            .with_status(401)
            .with_body("unauthorized")
            .create();

        let exchange = json!({"pres_ex_id": "exch-4"});
        let err = client("/oob401")
            .create_oob_invitation(&exchange, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AgentUnavailable(_)));
    }
}
