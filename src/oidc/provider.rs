// src/oidc/provider.rs
//! OIDC engine configuration and adapter.
//!
//! A `Provider` is one immutable configuration snapshot of the OIDC
//! engine: signing key, discovery document, the relying-party client map,
//! and the subject-identifier factory. `init_provider` builds a fresh
//! snapshot and atomically swaps it into the shared `ProviderHandle`
//! whenever the client registry changes; requests read whichever snapshot
//! was current when they started and never observe a partial update.
//!
//! The `AuthorizationState` (pending authorization requests and issued
//! codes) lives outside the snapshot, so re-initialization never drops
//! in-flight authentication attempts.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::{info, warn};
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::models::client::{ClientConfiguration, TokenEndpointAuthMethod};
use crate::oidc::discovery::DiscoveryDocument;
use crate::oidc::keys::{Jwks, SigningKey};
use crate::oidc::subject::SubjectIdentifierFactory;

const CODE_TTL_SECS: i64 = 300;
const ID_TOKEN_TTL_SECS: i64 = 3600;

/// An authorization request that has been validated and is waiting for
/// the credential presentation to complete.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub auth_request_id: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: Option<String>,
    pub nonce: Option<String>,
}

/// An authorization code bound to a verified subject, redeemable once.
#[derive(Debug, Clone)]
struct CodeGrant {
    client_id: String,
    subject: String,
    claims: BTreeMap<String, String>,
    nonce: Option<String>,
    expires_at: DateTime<Utc>,
}

/// Process-owned authorization state, shared across configuration
/// snapshots.
#[derive(Default)]
pub struct AuthorizationState {
    pending: Mutex<HashMap<String, PendingAuthorization>>,
    codes: Mutex<HashMap<String, CodeGrant>>,
}

impl AuthorizationState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Successful token-endpoint response.
#[derive(Serialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub id_token: String,
}

/// One immutable configuration snapshot of the OIDC engine.
pub struct Provider {
    signing_key: SigningKey,
    discovery: DiscoveryDocument,
    clients: HashMap<String, ClientConfiguration>,
    subjects: SubjectIdentifierFactory,
    auth_state: Arc<AuthorizationState>,
}

impl Provider {
    pub fn new(
        signing_key: SigningKey,
        discovery: DiscoveryDocument,
        clients: Vec<ClientConfiguration>,
        subjects: SubjectIdentifierFactory,
        auth_state: Arc<AuthorizationState>,
    ) -> Self {
        let clients = clients
            .into_iter()
            .map(|c| (c.client_id.clone(), c))
            .collect();
        Provider {
            signing_key,
            discovery,
            clients,
            subjects,
            auth_state,
        }
    }

    pub fn discovery(&self) -> &DiscoveryDocument {
        &self.discovery
    }

    pub fn jwks(&self) -> Jwks {
        self.signing_key.jwks()
    }

    /// Validates an incoming authorization request against the client
    /// snapshot.
    ///
    /// # Errors
    /// - `NotFound` for an unregistered client id
    /// - `Validation` for an unregistered redirect URI or a response type
    ///   the client may not request
    pub fn validate_authorization(
        &self,
        client_id: &str,
        redirect_uri: &str,
        response_type: Option<&str>,
    ) -> Result<&ClientConfiguration> {
        let client = self
            .clients
            .get(client_id)
            .ok_or_else(|| Error::NotFound(format!("client '{}'", client_id)))?;

        if !client.redirect_uris.iter().any(|uri| uri == redirect_uri) {
            return Err(Error::Validation(format!(
                "redirect_uri '{}' is not registered for client '{}'",
                redirect_uri, client_id
            )));
        }

        if let Some(requested) = response_type {
            if !client.response_types.iter().any(|t| t == requested) {
                return Err(Error::Validation(format!(
                    "response_type '{}' is not allowed for client '{}'",
                    requested, client_id
                )));
            }
        }

        Ok(client)
    }

    /// Records a validated authorization request, to be completed once
    /// the presentation exchange verifies.
    pub fn begin_authorization(&self, pending: PendingAuthorization) {
        let mut map = self.auth_state.pending.lock().unwrap();
        map.insert(pending.auth_request_id.clone(), pending);
    }

    /// Completes a pending authorization: derives the subject identifier
    /// from the presented claims and issues a one-shot authorization code.
    ///
    /// Returns the code together with the original request parameters so
    /// the caller can build the redirect.
    ///
    /// # Errors
    /// `NotFound` if the attempt is unknown or was already completed.
    pub fn issue_code(
        &self,
        auth_request_id: &str,
        claims: &BTreeMap<String, String>,
    ) -> Result<(String, PendingAuthorization)> {
        let pending = {
            let mut map = self.auth_state.pending.lock().unwrap();
            map.remove(auth_request_id)
        }
        .ok_or_else(|| Error::NotFound(format!("authorization attempt '{}'", auth_request_id)))?;

        let subject = self.subjects.subject_for(claims);
        let code = random_token();
        let grant = CodeGrant {
            client_id: pending.client_id.clone(),
            subject,
            claims: claims.clone(),
            nonce: pending.nonce.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(CODE_TTL_SECS),
        };

        let mut codes = self.auth_state.codes.lock().unwrap();
        codes.insert(code.clone(), grant);
        Ok((code, pending))
    }

    /// Redeems an authorization code for tokens, enforcing the client's
    /// registered token-endpoint authentication method.
    ///
    /// # Errors
    /// `Validation` for an unknown client, mismatched auth method or
    /// secret, and an unknown, expired, or foreign code. The code is
    /// consumed either way; replay always fails.
    pub fn redeem_code(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        presented_via: TokenEndpointAuthMethod,
    ) -> Result<TokenResponse> {
        let client = self
            .clients
            .get(client_id)
            .ok_or_else(|| Error::Validation(format!("unknown client '{}'", client_id)))?;

        if client.token_endpoint_auth_method != presented_via {
            return Err(Error::Validation(format!(
                "client '{}' must authenticate via {}",
                client_id,
                client.token_endpoint_auth_method.as_str()
            )));
        }
        if client.client_secret != client_secret {
            return Err(Error::Validation(format!(
                "bad credentials for client '{}'",
                client_id
            )));
        }

        let grant = {
            let mut codes = self.auth_state.codes.lock().unwrap();
            codes.remove(code)
        }
        .ok_or_else(|| Error::Validation("unknown or already redeemed code".into()))?;

        if grant.expires_at < Utc::now() {
            return Err(Error::Validation("authorization code expired".into()));
        }
        if grant.client_id != client_id {
            return Err(Error::Validation(
                "authorization code was issued to another client".into(),
            ));
        }

        let id_token = self.mint_id_token(&grant)?;
        Ok(TokenResponse {
            access_token: random_token(),
            token_type: "Bearer".into(),
            expires_in: ID_TOKEN_TTL_SECS,
            id_token,
        })
    }

    /// Signs the ID token: standard claims plus every presented
    /// credential attribute. Standard claims win on name collision.
    fn mint_id_token(&self, grant: &CodeGrant) -> Result<String> {
        let now = Utc::now();
        let mut claims: serde_json::Map<String, Value> = grant
            .claims
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        claims.insert("iss".into(), json!(self.discovery.issuer));
        claims.insert("sub".into(), json!(grant.subject));
        claims.insert("aud".into(), json!(grant.client_id));
        claims.insert("iat".into(), json!(now.timestamp()));
        claims.insert(
            "exp".into(),
            json!((now + chrono::Duration::seconds(ID_TOKEN_TTL_SECS)).timestamp()),
        );
        if let Some(nonce) = &grant.nonce {
            claims.insert("nonce".into(), json!(nonce));
        }

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.signing_key.kid.clone());
        jsonwebtoken::encode(&header, &Value::Object(claims), self.encoding_key())
            .map_err(|e| Error::KeyProvisioning(format!("id token signing failed: {}", e)))
    }

    fn encoding_key(&self) -> &EncodingKey {
        self.signing_key.encoding_key()
    }
}

/// Shared pointer to the current configuration snapshot.
///
/// Single writer (registry mutations), many readers (request handling):
/// readers clone the inner `Arc` and keep working on their snapshot while
/// a writer swaps in the next one.
#[derive(Default)]
pub struct ProviderHandle {
    current: RwLock<Option<Arc<Provider>>>,
}

impl ProviderHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot current at this instant, or `None` before the first
    /// initialization.
    pub fn current(&self) -> Option<Arc<Provider>> {
        self.current.read().unwrap().clone()
    }

    fn swap(&self, provider: Arc<Provider>) {
        let mut current = self.current.write().unwrap();
        *current = Some(provider);
    }
}

/// (Re)initializes the OIDC engine with a fresh configuration snapshot.
///
/// Callable repeatedly: every call atomically replaces the previous
/// snapshot. An empty client map is non-fatal (a fresh deployment has no
/// relying parties yet) but is logged; the first successful registry
/// write completes bootstrap.
pub fn init_provider(
    handle: &ProviderHandle,
    signing_key: SigningKey,
    discovery: DiscoveryDocument,
    clients: Vec<ClientConfiguration>,
    subjects: SubjectIdentifierFactory,
    auth_state: Arc<AuthorizationState>,
) {
    if clients.is_empty() {
        warn!("initializing OIDC provider with an empty client registry");
    } else {
        info!("initializing OIDC provider with {} client(s)", clients.len());
    }
    handle.swap(Arc::new(Provider::new(
        signing_key,
        discovery,
        clients,
        subjects,
        auth_state,
    )));
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}
