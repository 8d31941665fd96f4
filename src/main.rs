// src/main.rs

//! # Verifiable-Credential OIDC Controller - Main Entry Point
//!
//! Bridges a standards-compliant OIDC identity-provider surface to an
//! asynchronous verifiable-credential presentation protocol: relying
//! parties run a normal OIDC login, while the actual authentication is a
//! credential presentation exchanged with a remote agent over an
//! out-of-band invitation.
//!
//! ## Initialization Sequence
//! 1. Load environment configuration
//! 2. Provision the OIDC signing key (generated once, reused thereafter)
//! 3. Build the discovery document from the issuer URL
//! 4. Construct the credential-agent gateway for the configured tenancy
//! 5. Initialize the OIDC provider from the client registry
//! 6. Start the API server
//!
//! ## Environment Variables
//! Every setting has a development default; see `config.rs`. The ones a
//! deployment always overrides:
//! - `CONTROLLER_URL`: public issuer URL of this provider
//! - `ACAPY_ADMIN_URL`: credential-agent admin API
//! - `ACAPY_TENANCY`: "single" or "multi", with the matching credentials
//! - `SUBJECT_ID_HASH_SALT`: deployment secret behind stable subject ids
//! - `PROOF_REQUEST`: JSON proof requirements presented to wallets

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use dotenv::dotenv;
use log::warn;
use serde_json::Value;

use crate::agent::{tenancy_from_settings, AgentClient};
use crate::config::Settings;
use crate::oidc::provider::init_provider;
use crate::oidc::{
    build_discovery_document, ensure_signing_key, AuthorizationState, ProviderHandle,
    SubjectIdentifierFactory,
};
use crate::services::{ApiServer, ClientRegistry, OrchestratorConfig, PresentationOrchestrator};
use crate::storage::{MemoryClientStore, MemoryExchangeStore};

// Module declarations (organized by functional domain)
mod agent; // credential-agent gateway
mod config; // environment settings
mod error; // error taxonomy
mod models; // data structures
mod oidc; // keys, discovery, subject ids, provider snapshot
mod services; // business logic and API
mod storage; // persistence seams

/// Main application entry point
///
/// # Panics
/// - If the settings contain unparseable values
/// - If the signing key cannot be provisioned
/// - If the issuer URL is empty or malformed
#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::init();

    let settings = Settings::load().expect("Failed to load settings - check environment values");

    // Provision the signing key before any endpoint is served. Generated
    // exactly once; later startups load the persisted PEM.
    let signing_key = ensure_signing_key(
        Path::new(&settings.signing_key_path),
        settings.signing_key_size,
    )
    .expect("Failed to provision OIDC signing key");

    let discovery = build_discovery_document(&settings.controller_url, oidc::keys::SIGNING_ALG)
        .expect("Failed to build discovery document - check CONTROLLER_URL");

    // Credential-agent gateway, parameterized by tenancy mode.
    let tenancy = tenancy_from_settings(&settings).expect("Failed to configure agent tenancy");
    let agent = AgentClient::new(
        settings.acapy_admin_url.clone(),
        settings.invitation_label.clone(),
        std::time::Duration::from_secs(settings.agent_timeout_secs),
        tenancy,
    )
    .expect("Failed to construct credential-agent client");

    let proof_request: Value = serde_json::from_str(&settings.proof_request)
        .expect("PROOF_REQUEST is not valid JSON");

    let subjects = SubjectIdentifierFactory::new(settings.subject_id_hash_salt.clone());
    let registry = ClientRegistry::new(Arc::new(MemoryClientStore::new()));
    let auth_state = Arc::new(AuthorizationState::new());
    let provider = Arc::new(ProviderHandle::new());

    // A fresh deployment has no relying parties yet; that is non-fatal,
    // the first client write completes bootstrap.
    match registry.list().await {
        Ok(clients) => init_provider(
            &provider,
            signing_key.clone(),
            discovery.clone(),
            clients,
            subjects.clone(),
            auth_state.clone(),
        ),
        Err(e) => warn!("client registry unavailable at startup: {}", e),
    }

    let orchestrator = PresentationOrchestrator::new(
        Arc::new(agent),
        Arc::new(MemoryExchangeStore::new()),
        subjects.clone(),
        OrchestratorConfig {
            proof_request,
            use_public_did: settings.use_public_did,
            deadline_secs: settings.presentation_deadline_secs as i64,
        },
    );

    let api_server = ApiServer::new(
        registry,
        orchestrator,
        provider,
        auth_state,
        signing_key,
        discovery,
        subjects,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.listen_port));
    api_server.run(addr).await;
}
