/*
[INPUT]:  Last committed connection (strategy id + address)
[OUTPUT]: Persisted reconnect hint read back on startup
[POS]:    Session layer - session cache over a KeyValueStore
[UPDATE]: When cache keys or the record shape change
*/

use std::sync::Arc;

use crate::http::Result;

use super::store::KeyValueStore;

pub const STRATEGY_KEY: &str = "wallet-kit.strategy-id";
pub const ADDRESS_KEY: &str = "wallet-kit.address";

/// What the cache remembers about the last session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub strategy_id: String,
    pub address: String,
}

/// Reconnect hint persisted after a successful connect
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn KeyValueStore>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Both keys, or `None` if either one is missing or empty
    pub async fn read(&self) -> Result<Option<CacheRecord>> {
        let strategy_id = self.store.get(STRATEGY_KEY).await?;
        let address = self.store.get(ADDRESS_KEY).await?;

        Ok(match (strategy_id, address) {
            (Some(strategy_id), Some(address)) if !strategy_id.is_empty() && !address.is_empty() => {
                Some(CacheRecord {
                    strategy_id,
                    address,
                })
            }
            _ => None,
        })
    }

    pub async fn write(&self, strategy_id: &str, address: &str) -> Result<()> {
        self.store.set(STRATEGY_KEY, strategy_id).await?;
        self.store.set(ADDRESS_KEY, address).await
    }

    /// Update only the address after an in-wallet account switch
    pub async fn write_address(&self, address: &str) -> Result<()> {
        self.store.set(ADDRESS_KEY, address).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.remove(STRATEGY_KEY).await?;
        self.store.remove(ADDRESS_KEY).await
    }
}
