// src/services/client_registry.rs
//! Relying-party client registry.
//!
//! Sole writer of client configurations. Validation happens here, at the
//! boundary; storage only ever sees configurations that passed it. Every
//! successful mutation must be followed by re-initialization of the OIDC
//! provider so subsequent authorization requests observe the change
//! (read-after-write); the API layer drives that re-initialization.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::client::{ClientConfiguration, ClientConfigurationPatch};
use crate::storage::ClientConfigStore;

/// Registry of relying-party client configurations.
pub struct ClientRegistry {
    store: Arc<dyn ClientConfigStore>,
}

impl ClientRegistry {
    pub fn new(store: Arc<dyn ClientConfigStore>) -> Self {
        ClientRegistry { store }
    }

    /// Every registered configuration. Consumers must not assume any
    /// ordering.
    pub async fn list(&self) -> Result<Vec<ClientConfiguration>> {
        self.store.get_all().await
    }

    /// Looks up one client.
    ///
    /// # Errors
    /// `NotFound` if no client with that id is registered.
    pub async fn get(&self, client_id: &str) -> Result<ClientConfiguration> {
        self.store
            .get(client_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("client '{}'", client_id)))
    }

    /// Inserts or replaces a client configuration.
    ///
    /// # Errors
    /// `Validation` if the identifier is malformed or the redirect-URI
    /// set is empty; nothing is persisted in that case.
    pub async fn upsert(&self, config: ClientConfiguration) -> Result<ClientConfiguration> {
        Self::validate(&config)?;
        self.store.put(config.clone()).await?;
        Ok(config)
    }

    /// Applies a partial update to an existing client.
    ///
    /// # Errors
    /// `NotFound` if the client does not exist; `Validation` if the
    /// patched result would be invalid.
    pub async fn patch(
        &self,
        client_id: &str,
        patch: ClientConfigurationPatch,
    ) -> Result<ClientConfiguration> {
        let existing = self.get(client_id).await?;
        let updated = patch.apply(existing);
        Self::validate(&updated)?;
        self.store.put(updated.clone()).await?;
        Ok(updated)
    }

    /// Removes a client.
    ///
    /// # Errors
    /// `NotFound` if no client with that id is registered.
    pub async fn delete(&self, client_id: &str) -> Result<()> {
        if !self.store.remove(client_id).await? {
            return Err(Error::NotFound(format!("client '{}'", client_id)));
        }
        Ok(())
    }

    fn validate(config: &ClientConfiguration) -> Result<()> {
        if config.client_id.is_empty() || config.client_id.chars().any(char::is_whitespace) {
            return Err(Error::Validation(format!(
                "client_id '{}' is malformed",
                config.client_id
            )));
        }
        if config.redirect_uris.is_empty() {
            return Err(Error::Validation("redirect_uris must not be empty".into()));
        }
        if let Some(bad) = config
            .redirect_uris
            .iter()
            .find(|uri| !uri.starts_with("http://") && !uri.starts_with("https://"))
        {
            return Err(Error::Validation(format!(
                "redirect_uri '{}' is not an http(s) URL",
                bad
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::client::TokenEndpointAuthMethod;
    use crate::storage::MemoryClientStore;

    fn registry() -> ClientRegistry {
        ClientRegistry::new(Arc::new(MemoryClientStore::new()))
    }

    fn config(client_id: &str) -> ClientConfiguration {
        ClientConfiguration {
            client_id: client_id.into(),
            client_name: "Test RP".into(),
            response_types: vec!["code".into()],
            redirect_uris: vec!["https://rp.example/cb".into()],
            token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
            client_secret: "s3cret".into(),
        }
    }

    #[tokio::test]
    async fn upsert_list_delete_round_trip() {
        let registry = registry();
        registry.upsert(config("abc")).await.unwrap();

        let listed = registry.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].client_id, "abc");

        // Replacing the same id must not duplicate it.
        let mut renamed = config("abc");
        renamed.client_name = "Renamed RP".into();
        registry.upsert(renamed).await.unwrap();
        let listed = registry.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].client_name, "Renamed RP");

        registry.delete("abc").await.unwrap();
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_empty_redirect_uris() {
        let registry = registry();
        let mut bad = config("abc");
        bad.redirect_uris.clear();

        let err = registry.upsert(bad).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_malformed_client_id() {
        let registry = registry();
        assert!(matches!(
            registry.upsert(config("")).await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            registry.upsert(config("has space")).await.unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn delete_and_patch_missing_client_not_found() {
        let registry = registry();
        assert!(matches!(
            registry.delete("ghost").await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            registry
                .patch("ghost", ClientConfigurationPatch::default())
                .await
                .unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn patch_updates_named_fields_only() {
        let registry = registry();
        registry.upsert(config("abc")).await.unwrap();

        let updated = registry
            .patch(
                "abc",
                ClientConfigurationPatch {
                    client_secret: Some("rotated".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.client_secret, "rotated");
        assert_eq!(updated.client_name, "Test RP");

        // A patch that would empty the redirect URIs is rejected and not
        // persisted.
        let err = registry
            .patch(
                "abc",
                ClientConfigurationPatch {
                    redirect_uris: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(registry.get("abc").await.unwrap().redirect_uris.len(), 1);
    }
}
