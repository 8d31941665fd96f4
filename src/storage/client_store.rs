// src/storage/client_store.rs
//! Storage seam for relying-party client configurations.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::client::ClientConfiguration;

/// Durable store of client configurations, keyed by `client_id`.
///
/// The registry is the sole writer; readers must never observe a
/// partially-applied mutation.
#[async_trait]
pub trait ClientConfigStore: Send + Sync {
    /// Returns every stored configuration. No ordering guarantee.
    async fn get_all(&self) -> Result<Vec<ClientConfiguration>>;

    /// Looks up one configuration by client identifier.
    async fn get(&self, client_id: &str) -> Result<Option<ClientConfiguration>>;

    /// Inserts or replaces a configuration.
    async fn put(&self, config: ClientConfiguration) -> Result<()>;

    /// Removes a configuration; returns whether anything was removed.
    async fn remove(&self, client_id: &str) -> Result<bool>;
}

/// In-memory store used by tests and single-node deployments.
#[derive(Default)]
pub struct MemoryClientStore {
    configs: RwLock<HashMap<String, ClientConfiguration>>,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientConfigStore for MemoryClientStore {
    async fn get_all(&self) -> Result<Vec<ClientConfiguration>> {
        let configs = self.configs.read().unwrap();
        Ok(configs.values().cloned().collect())
    }

    async fn get(&self, client_id: &str) -> Result<Option<ClientConfiguration>> {
        let configs = self.configs.read().unwrap();
        Ok(configs.get(client_id).cloned())
    }

    async fn put(&self, config: ClientConfiguration) -> Result<()> {
        let mut configs = self.configs.write().unwrap();
        configs.insert(config.client_id.clone(), config);
        Ok(())
    }

    async fn remove(&self, client_id: &str) -> Result<bool> {
        let mut configs = self.configs.write().unwrap();
        Ok(configs.remove(client_id).is_some())
    }
}
