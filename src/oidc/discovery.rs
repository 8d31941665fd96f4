// src/oidc/discovery.rs
//! OIDC discovery metadata.
//!
//! The discovery document is derived purely from the issuer URL and the
//! signing algorithm; it never changes after startup.

use log::error;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::client::TokenEndpointAuthMethod;

/// The provider's `/.well-known/openid-configuration` document.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    pub response_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub response_modes_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub claim_types_supported: Vec<String>,
    pub claims_parameter_supported: bool,
    pub claims_supported: Vec<String>,
    pub request_parameter_supported: bool,
    pub request_uri_parameter_supported: bool,
    pub scopes_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub frontchannel_logout_supported: bool,
    pub frontchannel_logout_session_supported: bool,
    pub backchannel_logout_supported: bool,
    pub backchannel_logout_session_supported: bool,
}

/// Builds the discovery document for the given issuer.
///
/// The issuer must be an absolute http(s) URL. A plain-http issuer is
/// rewritten to https so locally configured deployments still publish an
/// https issuer; this is a documented deviation for development
/// convenience, logged at error level, never a silent default.
///
/// # Errors
/// `Error::Configuration` if the issuer is empty or not an http(s) URL.
pub fn build_discovery_document(issuer_url: &str, signing_alg: &str) -> Result<DiscoveryDocument> {
    let issuer_url = issuer_url.trim();
    if issuer_url.is_empty() {
        return Err(Error::Configuration("issuer URL is empty".into()));
    }

    let issuer = if let Some(rest) = issuer_url.strip_prefix("https://") {
        require_host(rest)?;
        issuer_url.to_string()
    } else if let Some(rest) = issuer_url.strip_prefix("http://") {
        require_host(rest)?;
        error!("issuer URL is not HTTPS; rewriting discovery metadata for development");
        format!("https://{}", rest)
    } else {
        return Err(Error::Configuration(format!(
            "issuer URL '{}' is not an http(s) URL",
            issuer_url
        )));
    };

    Ok(DiscoveryDocument {
        authorization_endpoint: format!("{}/authorization", issuer),
        token_endpoint: format!("{}/token", issuer),
        jwks_uri: format!("{}/.well-known/openid-configuration/jwks", issuer),
        issuer,
        response_types_supported: vec!["code".into(), "id_token".into(), "token".into()],
        id_token_signing_alg_values_supported: vec![signing_alg.into()],
        response_modes_supported: vec!["fragment".into(), "query".into(), "form_post".into()],
        subject_types_supported: vec!["public".into()],
        grant_types_supported: vec!["hybrid".into()],
        claim_types_supported: vec!["normal".into()],
        claims_parameter_supported: true,
        claims_supported: vec!["sub".into()],
        request_parameter_supported: true,
        request_uri_parameter_supported: false,
        scopes_supported: vec!["openid".into(), "profile".into()],
        token_endpoint_auth_methods_supported: vec![
            TokenEndpointAuthMethod::ClientSecretBasic.as_str().into(),
            TokenEndpointAuthMethod::ClientSecretPost.as_str().into(),
        ],
        frontchannel_logout_supported: true,
        frontchannel_logout_session_supported: true,
        backchannel_logout_supported: true,
        backchannel_logout_session_supported: true,
    })
}

fn require_host(rest: &str) -> Result<()> {
    let host = rest.split('/').next().unwrap_or("");
    if host.is_empty() {
        return Err(Error::Configuration("issuer URL has no host".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_endpoints_from_issuer() {
        let doc = build_discovery_document("https://auth.example.org", "RS256").unwrap();
        assert_eq!(doc.issuer, "https://auth.example.org");
        assert_eq!(
            doc.authorization_endpoint,
            "https://auth.example.org/authorization"
        );
        assert_eq!(doc.token_endpoint, "https://auth.example.org/token");
        assert_eq!(
            doc.jwks_uri,
            "https://auth.example.org/.well-known/openid-configuration/jwks"
        );
        assert_eq!(doc.id_token_signing_alg_values_supported, vec!["RS256"]);
    }

    #[test]
    fn rewrites_plain_http_issuer() {
        let doc = build_discovery_document("http://localhost:5000", "RS256").unwrap();
        assert_eq!(doc.issuer, "https://localhost:5000");
    }

    #[test]
    fn rejects_empty_and_malformed_issuers() {
        assert!(matches!(
            build_discovery_document("", "RS256"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            build_discovery_document("   ", "RS256"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            build_discovery_document("ftp://auth.example.org", "RS256"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            build_discovery_document("https:///path-only", "RS256"),
            Err(Error::Configuration(_))
        ));
    }
}
