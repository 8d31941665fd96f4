// src/config.rs
//! Runtime settings for the controller.
//!
//! Settings come from the process environment (optionally seeded from a
//! `.env` file loaded in `main`). Every field has a development default so
//! the service starts locally without any configuration; production
//! deployments override via environment variables with the same names,
//! upper-cased (e.g. `CONTROLLER_URL`, `ACAPY_ADMIN_URL`).

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Full configuration surface of the controller.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Public issuer URL of this OIDC provider.
    pub controller_url: String,

    /// Path of the PEM-encoded PKCS#8 signing key; created on first run.
    pub signing_key_path: String,

    /// RSA modulus size in bits for a freshly generated signing key.
    pub signing_key_size: usize,

    /// Base URL of the credential agent's admin API.
    pub acapy_admin_url: String,

    /// Agent tenancy mode: "single" or "multi".
    pub acapy_tenancy: String,

    /// Admin API key for a single-tenant agent (empty disables the header).
    pub st_acapy_admin_api_key: String,

    /// Wallet id and key for a multi-tenant agent.
    pub mt_acapy_wallet_id: String,
    pub mt_acapy_wallet_key: String,

    /// Deployment secret mixed into every derived subject identifier.
    pub subject_id_hash_salt: String,

    /// Label presented to wallets inside out-of-band invitations.
    pub invitation_label: String,

    /// Whether invitations reference the agent's public DID.
    pub use_public_did: bool,

    /// Seconds an authentication attempt may stay pending before it is
    /// timed out.
    pub presentation_deadline_secs: u64,

    /// Per-call timeout for requests to the credential agent, distinct
    /// from the attempt-level deadline above.
    pub agent_timeout_secs: u64,

    /// Proof requirements forwarded verbatim to the agent, as a JSON
    /// document. What gets requested is deployment policy, not code.
    pub proof_request: String,

    /// Port the HTTP surface listens on.
    pub listen_port: u16,
}

impl Settings {
    /// Loads settings from the environment, falling back to development
    /// defaults for anything unset.
    ///
    /// # Errors
    /// Returns `Error::Configuration` if the environment contains values
    /// that cannot be parsed into the expected types.
    pub fn load() -> Result<Self> {
        Config::builder()
            .set_default("controller_url", "http://localhost:5000")
            .and_then(|b| b.set_default("signing_key_path", "signing_key.pem"))
            .and_then(|b| b.set_default("signing_key_size", 2048))
            .and_then(|b| b.set_default("acapy_admin_url", "http://localhost:8031"))
            .and_then(|b| b.set_default("acapy_tenancy", "single"))
            .and_then(|b| b.set_default("st_acapy_admin_api_key", ""))
            .and_then(|b| b.set_default("mt_acapy_wallet_id", ""))
            .and_then(|b| b.set_default("mt_acapy_wallet_key", ""))
            .and_then(|b| b.set_default("subject_id_hash_salt", "test_hash_salt"))
            .and_then(|b| b.set_default("invitation_label", "vc-authn"))
            .and_then(|b| b.set_default("use_public_did", false))
            .and_then(|b| b.set_default("presentation_deadline_secs", 300))
            .and_then(|b| b.set_default("agent_timeout_secs", 30))
            .and_then(|b| b.set_default("proof_request", "{}"))
            .and_then(|b| b.set_default("listen_port", 5000))
            .map_err(|e| Error::Configuration(e.to_string()))?
            .add_source(Environment::default().try_parsing(true))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| Error::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_environment() {
        let settings = Settings::load().expect("defaults should parse");
        assert_eq!(settings.acapy_tenancy, "single");
        assert_eq!(settings.signing_key_size, 2048);
        assert!(!settings.use_public_did);
    }
}
