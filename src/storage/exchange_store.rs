// src/storage/exchange_store.rs
//! Storage seam for presentation-exchange state.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::exchange::PresentationExchange;

/// Store of exchange state, keyed by the agent-assigned exchange id.
///
/// Each exchange is owned by exactly one authentication attempt, so the
/// store sees no cross-attempt write contention. Abandoned attempts are
/// simply left unreferenced; no cleanup is required.
#[async_trait]
pub trait ExchangeStore: Send + Sync {
    /// Inserts or replaces an exchange record.
    async fn put(&self, exchange: PresentationExchange) -> Result<()>;

    /// Looks up an exchange by its agent-assigned identifier.
    async fn get(&self, pres_ex_id: &str) -> Result<Option<PresentationExchange>>;
}

/// In-memory store used by tests and single-node deployments.
#[derive(Default)]
pub struct MemoryExchangeStore {
    exchanges: RwLock<HashMap<String, PresentationExchange>>,
}

impl MemoryExchangeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExchangeStore for MemoryExchangeStore {
    async fn put(&self, exchange: PresentationExchange) -> Result<()> {
        let mut exchanges = self.exchanges.write().unwrap();
        exchanges.insert(exchange.pres_ex_id.clone(), exchange);
        Ok(())
    }

    async fn get(&self, pres_ex_id: &str) -> Result<Option<PresentationExchange>> {
        let exchanges = self.exchanges.read().unwrap();
        Ok(exchanges.get(pres_ex_id).cloned())
    }
}
