// src/services/api_server.rs
//! HTTP surface of the verifiable-credential OIDC controller.
//!
//! The API is built using Axum and includes endpoints for:
//! - OIDC discovery and JWKS
//! - The authorization endpoint that opens a presentation exchange
//! - Poll/callback endpoints the relying party's frontend drives while
//!   the wallet completes the exchange out-of-band
//! - The token endpoint redeeming authorization codes
//! - Administrative client-configuration CRUD
//!
//! Every successful client mutation re-initializes the OIDC provider so
//! the next authorization request observes the updated registry.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Router,
};
use log::{error, info};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;

use crate::error::Error;
use crate::models::client::{
    ClientConfiguration, ClientConfigurationPatch, TokenEndpointAuthMethod,
};
use crate::models::exchange::ExchangeState;
use crate::oidc::provider::{init_provider, PendingAuthorization};
use crate::oidc::{
    AuthorizationState, DiscoveryDocument, ProviderHandle, SigningKey, SubjectIdentifierFactory,
};
use crate::services::client_registry::ClientRegistry;
use crate::services::orchestrator::PresentationOrchestrator;

/// Query parameters of the OIDC authorization endpoint.
#[derive(Deserialize)]
struct AuthorizationParams {
    client_id: String,
    redirect_uri: String,
    response_type: Option<String>,
    state: Option<String>,
    nonce: Option<String>,
}

/// Query parameters shared by the poll and callback endpoints.
#[derive(Deserialize)]
struct ExchangeParams {
    pid: String,
}

/// Form body of the token endpoint.
#[derive(Deserialize)]
struct TokenRequest {
    grant_type: String,
    code: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

/// API server state containing all service dependencies.
#[derive(Clone)]
pub struct ApiServer {
    /// Registry of relying-party client configurations.
    registry: Arc<ClientRegistry>,

    /// Orchestrator driving presentation exchanges.
    orchestrator: Arc<PresentationOrchestrator>,

    /// Current OIDC engine configuration snapshot.
    provider: Arc<ProviderHandle>,

    /// Process-owned authorization state, shared across snapshots.
    auth_state: Arc<AuthorizationState>,

    /// Inputs needed to rebuild the provider snapshot on registry change.
    signing_key: SigningKey,
    discovery: DiscoveryDocument,
    subjects: SubjectIdentifierFactory,
}

impl ApiServer {
    pub fn new(
        registry: ClientRegistry,
        orchestrator: PresentationOrchestrator,
        provider: Arc<ProviderHandle>,
        auth_state: Arc<AuthorizationState>,
        signing_key: SigningKey,
        discovery: DiscoveryDocument,
        subjects: SubjectIdentifierFactory,
    ) -> Self {
        ApiServer {
            registry: Arc::new(registry),
            orchestrator: Arc::new(orchestrator),
            provider,
            auth_state,
            signing_key,
            discovery,
            subjects,
        }
    }

    /// Starts the API server and begins listening for requests.
    pub async fn run(&self, addr: SocketAddr) {
        let app = Router::new()
            .route(
                "/.well-known/openid-configuration",
                get(Self::discovery_handler),
            )
            .route(
                "/.well-known/openid-configuration/jwks",
                get(Self::jwks_handler),
            )
            .route("/authorization", get(Self::authorize_handler))
            .route("/vc/connect/poll", get(Self::poll_handler))
            .route("/vc/connect/callback", get(Self::callback_handler))
            .route("/token", post(Self::token_handler))
            .route(
                "/clients",
                get(Self::list_clients_handler).post(Self::create_client_handler),
            )
            .route(
                "/clients/:client_id",
                get(Self::get_client_handler)
                    .patch(Self::patch_client_handler)
                    .delete(Self::delete_client_handler),
            )
            .with_state(Arc::new(self.clone()));

        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        info!("API server listening on {}", addr);
        axum::serve(listener, app).await.unwrap();
    }

    /// Rebuilds the provider snapshot from the current registry contents.
    /// Called after every successful client mutation (read-after-write
    /// consistency for subsequent authorization requests).
    async fn reinit_provider(&self) {
        match self.registry.list().await {
            Ok(clients) => init_provider(
                &self.provider,
                self.signing_key.clone(),
                self.discovery.clone(),
                clients,
                self.subjects.clone(),
                self.auth_state.clone(),
            ),
            Err(e) => error!("client registry reload failed: {}", e),
        }
    }

    // =====================
    // Discovery
    // =====================

    async fn discovery_handler(State(state): State<Arc<ApiServer>>) -> impl IntoResponse {
        match state.provider.current() {
            Some(provider) => (StatusCode::OK, Json(provider.discovery().clone())).into_response(),
            None => provider_unavailable(),
        }
    }

    async fn jwks_handler(State(state): State<Arc<ApiServer>>) -> impl IntoResponse {
        match state.provider.current() {
            Some(provider) => (StatusCode::OK, Json(provider.jwks())).into_response(),
            None => provider_unavailable(),
        }
    }

    // =====================
    // Authentication Flow
    // =====================

    /// Opens an authentication attempt: validates the relying party,
    /// starts a presentation exchange, and returns the out-of-band
    /// invitation for the frontend to render (QR code or deep link).
    async fn authorize_handler(
        State(state): State<Arc<ApiServer>>,
        Query(params): Query<AuthorizationParams>,
    ) -> impl IntoResponse {
        let provider = match state.provider.current() {
            Some(provider) => provider,
            None => return provider_unavailable(),
        };

        if let Err(e) = provider.validate_authorization(
            &params.client_id,
            &params.redirect_uri,
            params.response_type.as_deref(),
        ) {
            return error_response(&e);
        }

        let auth_request_id = random_request_id();
        provider.begin_authorization(PendingAuthorization {
            auth_request_id: auth_request_id.clone(),
            client_id: params.client_id,
            redirect_uri: params.redirect_uri,
            state: params.state,
            nonce: params.nonce,
        });

        match state.orchestrator.start(&auth_request_id).await {
            Ok((exchange, invitation)) => (
                StatusCode::OK,
                Json(json!({
                    "auth_request_id": auth_request_id,
                    "pres_ex_id": exchange.pres_ex_id,
                    "invitation_url": invitation.invitation_url,
                    "invitation": invitation.invitation,
                    "poll_url": format!("/vc/connect/poll?pid={}", exchange.pres_ex_id),
                })),
            )
                .into_response(),
            Err(e) => {
                error!("presentation request failed: {}", e);
                error_response(&e)
            }
        }
    }

    /// Reports the attempt state; the frontend polls this until it turns
    /// terminal. End users see the state only, never protocol internals.
    async fn poll_handler(
        State(state): State<Arc<ApiServer>>,
        Query(params): Query<ExchangeParams>,
    ) -> impl IntoResponse {
        match state.orchestrator.poll(&params.pid).await {
            Ok(exchange) => {
                (StatusCode::OK, Json(json!({ "state": exchange.state }))).into_response()
            }
            Err(e) => {
                error!("poll failed for {}: {}", params.pid, e);
                error_response(&e)
            }
        }
    }

    /// Completes a verified attempt: issues the authorization code and
    /// redirects back to the relying party.
    async fn callback_handler(
        State(state): State<Arc<ApiServer>>,
        Query(params): Query<ExchangeParams>,
    ) -> impl IntoResponse {
        let provider = match state.provider.current() {
            Some(provider) => provider,
            None => return provider_unavailable(),
        };

        let exchange = match state.orchestrator.status(&params.pid).await {
            Ok(exchange) => exchange,
            Err(e) => return error_response(&e),
        };
        if exchange.state != ExchangeState::Verified {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "authentication is not complete" })),
            )
                .into_response();
        }

        let claims = exchange.claims.unwrap_or_default();
        match provider.issue_code(&exchange.auth_request_id, &claims) {
            Ok((code, request)) => {
                let mut location = format!("{}?code={}", request.redirect_uri, code);
                if let Some(rp_state) = request.state {
                    location.push_str(&format!("&state={}", rp_state));
                }
                Redirect::to(&location).into_response()
            }
            Err(e) => error_response(&e),
        }
    }

    /// Redeems an authorization code. Supports `client_secret_basic` and
    /// `client_secret_post`, checked against the client's registration.
    async fn token_handler(
        State(state): State<Arc<ApiServer>>,
        headers: HeaderMap,
        Form(form): Form<TokenRequest>,
    ) -> impl IntoResponse {
        if form.grant_type != "authorization_code" {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "unsupported_grant_type" })),
            )
                .into_response();
        }

        let provider = match state.provider.current() {
            Some(provider) => provider,
            None => return provider_unavailable(),
        };

        let (client_id, client_secret, presented_via) = match basic_credentials(&headers) {
            Some((id, secret)) => (id, secret, TokenEndpointAuthMethod::ClientSecretBasic),
            None => match (form.client_id, form.client_secret) {
                (Some(id), Some(secret)) => (id, secret, TokenEndpointAuthMethod::ClientSecretPost),
                _ => {
                    return (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({ "error": "invalid_client" })),
                    )
                        .into_response()
                }
            },
        };

        match provider.redeem_code(&form.code, &client_id, &client_secret, presented_via) {
            Ok(tokens) => (StatusCode::OK, Json(tokens)).into_response(),
            Err(e) => error_response(&e),
        }
    }

    // =====================
    // Client Configuration CRUD
    // =====================

    async fn list_clients_handler(State(state): State<Arc<ApiServer>>) -> impl IntoResponse {
        match state.registry.list().await {
            Ok(clients) => (StatusCode::OK, Json(clients)).into_response(),
            Err(e) => error_response(&e),
        }
    }

    async fn create_client_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<ClientConfiguration>,
    ) -> impl IntoResponse {
        match state.registry.upsert(payload).await {
            Ok(config) => {
                state.reinit_provider().await;
                (StatusCode::OK, Json(config)).into_response()
            }
            Err(e) => error_response(&e),
        }
    }

    async fn get_client_handler(
        State(state): State<Arc<ApiServer>>,
        Path(client_id): Path<String>,
    ) -> impl IntoResponse {
        match state.registry.get(&client_id).await {
            Ok(config) => (StatusCode::OK, Json(config)).into_response(),
            Err(e) => error_response(&e),
        }
    }

    async fn patch_client_handler(
        State(state): State<Arc<ApiServer>>,
        Path(client_id): Path<String>,
        Json(payload): Json<ClientConfigurationPatch>,
    ) -> impl IntoResponse {
        match state.registry.patch(&client_id, payload).await {
            Ok(config) => {
                state.reinit_provider().await;
                (StatusCode::OK, Json(config)).into_response()
            }
            Err(e) => error_response(&e),
        }
    }

    async fn delete_client_handler(
        State(state): State<Arc<ApiServer>>,
        Path(client_id): Path<String>,
    ) -> impl IntoResponse {
        match state.registry.delete(&client_id).await {
            Ok(()) => {
                state.reinit_provider().await;
                StatusCode::NO_CONTENT.into_response()
            }
            Err(e) => error_response(&e),
        }
    }
}

/// Maps service errors onto HTTP responses. Administrative callers get
/// field-level validation detail; everything else is a terse error body.
fn error_response(err: &Error) -> axum::response::Response {
    let status = match err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::AgentUnavailable(_) | Error::KeyProvisioning(_) | Error::Configuration(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn provider_unavailable() -> axum::response::Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "OIDC provider is not initialized" })),
    )
        .into_response()
}

/// Parses `Authorization: Basic` credentials from the token request.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(base64::decode(encoded).ok()?).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

fn random_request_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}
