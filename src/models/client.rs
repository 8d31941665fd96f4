// src/models/client.rs
//! Relying-party client configuration data model.
//!
//! Defines the registration record the OIDC provider consults for every
//! authorization request, plus the partial-update variant accepted by the
//! administrative API.

use serde::{Deserialize, Serialize};

/// How a relying party authenticates against the token endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// Credentials in an `Authorization: Basic` header.
    ClientSecretBasic,
    /// Credentials in the form body of the token request.
    ClientSecretPost,
}

impl Default for TokenEndpointAuthMethod {
    fn default() -> Self {
        TokenEndpointAuthMethod::ClientSecretBasic
    }
}

impl TokenEndpointAuthMethod {
    /// Wire name as it appears in discovery metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenEndpointAuthMethod::ClientSecretBasic => "client_secret_basic",
            TokenEndpointAuthMethod::ClientSecretPost => "client_secret_post",
        }
    }
}

fn default_response_types() -> Vec<String> {
    vec!["code".into(), "id_token".into(), "token".into()]
}

/// Registration record for one relying party.
///
/// Invariants enforced at the registry boundary:
/// - `client_id` is unique across the registry and non-empty
/// - `redirect_uris` is a non-empty set
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientConfiguration {
    /// Unique identifier the relying party presents in authorization
    /// requests.
    pub client_id: String,

    /// Human-readable display name.
    pub client_name: String,

    /// OIDC response types this client may request.
    #[serde(default = "default_response_types")]
    pub response_types: Vec<String>,

    /// Redirect URIs registered for the authorization response.
    pub redirect_uris: Vec<String>,

    /// Token-endpoint authentication method.
    #[serde(default)]
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,

    /// Shared secret checked at the token endpoint.
    pub client_secret: String,
}

/// Partial update for a registered client; every field except the path
/// identity may be omitted.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ClientConfigurationPatch {
    pub client_name: Option<String>,
    pub response_types: Option<Vec<String>>,
    pub redirect_uris: Option<Vec<String>>,
    pub token_endpoint_auth_method: Option<TokenEndpointAuthMethod>,
    pub client_secret: Option<String>,
}

impl ClientConfigurationPatch {
    /// Applies the patch on top of an existing configuration, leaving
    /// omitted fields untouched.
    pub fn apply(self, mut base: ClientConfiguration) -> ClientConfiguration {
        if let Some(name) = self.client_name {
            base.client_name = name;
        }
        if let Some(types) = self.response_types {
            base.response_types = types;
        }
        if let Some(uris) = self.redirect_uris {
            base.redirect_uris = uris;
        }
        if let Some(method) = self.token_endpoint_auth_method {
            base.token_endpoint_auth_method = method;
        }
        if let Some(secret) = self.client_secret {
            base.client_secret = secret;
        }
        base
    }
}
