// src/agent/tenancy.rs
//! Tenancy-specific authentication headers for the credential agent.
//!
//! Single-tenant agents take an admin API key on every call; multi-tenant
//! agents require a wallet-scoped bearer token obtained once from the
//! multitenancy endpoint. The gateway is parameterized with one of these
//! at construction time and never chooses per call.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::json;

use crate::config::Settings;
use crate::error::{Error, Result};

const WALLET_TOKEN_PATH: &str = "/multitenancy/wallet";

/// Supplies the authentication headers for every gateway call.
#[async_trait]
pub trait TenancyHeaders: Send + Sync {
    async fn headers(&self) -> Result<HeaderMap>;
}

/// Single-tenant agent: a static admin API key, or no header at all for
/// unprotected development agents.
pub struct SingleTenant {
    api_key: Option<String>,
}

impl SingleTenant {
    pub fn new(api_key: Option<String>) -> Self {
        SingleTenant { api_key }
    }
}

#[async_trait]
impl TenancyHeaders for SingleTenant {
    async fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            headers.insert(
                HeaderName::from_static("x-api-key"),
                HeaderValue::from_str(key)
                    .map_err(|e| Error::Configuration(format!("invalid admin api key: {}", e)))?,
            );
        }
        Ok(headers)
    }
}

/// Multi-tenant agent: exchanges the wallet key for a bearer token on
/// first use and caches it for the process lifetime.
pub struct MultiTenant {
    admin_url: String,
    wallet_id: String,
    wallet_key: String,
    http: reqwest::Client,
    token: tokio::sync::Mutex<Option<String>>,
}

impl MultiTenant {
    pub fn new(admin_url: String, wallet_id: String, wallet_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        Ok(MultiTenant {
            admin_url,
            wallet_id,
            wallet_key,
            http,
            token: tokio::sync::Mutex::new(None),
        })
    }

    async fn wallet_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        debug!(">>> wallet_token");
        let url = format!(
            "{}{}/{}/token",
            self.admin_url, WALLET_TOKEN_PATH, self.wallet_id
        );
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "wallet_key": self.wallet_key }))
            .send()
            .await
            .map_err(|e| Error::AgentUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::AgentUnavailable(format!("{}::{}", status, body)));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::AgentUnavailable(e.to_string()))?;
        let token = body
            .get("token")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::AgentUnavailable("wallet token response missing token".into()))?
            .to_string();

        *cached = Some(token.clone());
        debug!("<<< wallet_token");
        Ok(token)
    }
}

#[async_trait]
impl TenancyHeaders for MultiTenant {
    async fn headers(&self) -> Result<HeaderMap> {
        let token = self.wallet_token().await?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::Configuration(format!("invalid wallet token: {}", e)))?,
        );
        Ok(headers)
    }
}

/// Selects the tenancy header provider from settings. An unrecognized
/// tenancy mode falls back to single-tenant with a warning, matching the
/// agent's own permissive default.
pub fn tenancy_from_settings(settings: &Settings) -> Result<Box<dyn TenancyHeaders>> {
    match settings.acapy_tenancy.as_str() {
        "multi" => Ok(Box::new(MultiTenant::new(
            settings.acapy_admin_url.clone(),
            settings.mt_acapy_wallet_id.clone(),
            settings.mt_acapy_wallet_key.clone(),
        )?)),
        "single" => Ok(Box::new(SingleTenant::new(optional(
            &settings.st_acapy_admin_api_key,
        )))),
        other => {
            warn!("unknown ACAPY_TENANCY '{}', assuming single-tenant", other);
            Ok(Box::new(SingleTenant::new(optional(
                &settings.st_acapy_admin_api_key,
            ))))
        }
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_tenant_sets_api_key_header() {
        let tenancy = SingleTenant::new(Some("secret-admin-key".into()));
        let headers = tenancy.headers().await.unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "secret-admin-key");
    }

    #[tokio::test]
    async fn single_tenant_without_key_sends_no_headers() {
        let tenancy = SingleTenant::new(None);
        let headers = tenancy.headers().await.unwrap();
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn multi_tenant_fetches_and_caches_wallet_token() {
        let _m = mockito::mock("POST", "/tenancy/multitenancy/wallet/w1/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": "jwt-token"}"#)
            .expect(1)
            .create();

        let admin_url = format!("{}/tenancy", mockito::server_url());
        let tenancy = MultiTenant::new(admin_url, "w1".into(), "wallet-key".into()).unwrap();

        let first = tenancy.headers().await.unwrap();
        assert_eq!(first.get(AUTHORIZATION).unwrap(), "Bearer jwt-token");

        // Second call must come from the cache; the mock expects exactly
        // one request.
        let second = tenancy.headers().await.unwrap();
        assert_eq!(second.get(AUTHORIZATION).unwrap(), "Bearer jwt-token");
        _m.assert();
    }
}
