/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for wallet-kit tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use wallet_kit::strategy::{AuthorizationCode, OAuthAuthorizer, OAuthStrategyFactory};
use wallet_kit::{
    ConnectionState, KeyValueStore, ManagerConfig, MemoryStore, MockWAuthBackend, Result,
    Strategy, StrategyRegistry, WAuthProvider, WAuthStrategy, WalletError, WalletManager,
};
use wiremock::MockServer;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Manager config with a short OAuth grace interval
pub fn fast_config() -> ManagerConfig {
    ManagerConfig {
        reconnect_grace: Duration::from_millis(50),
        ..ManagerConfig::default()
    }
}

pub fn manager(registry: StrategyRegistry, store: Arc<dyn KeyValueStore>) -> WalletManager {
    WalletManager::new(registry, store, fast_config())
}

pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Factory handing out prepared backends; providers without one get a signed-out mock
pub fn oauth_factory(backends: Vec<Arc<MockWAuthBackend>>) -> OAuthStrategyFactory {
    Arc::new(move |provider: WAuthProvider| {
        let backend = backends
            .iter()
            .find(|backend| wallet_kit::WAuthBackend::provider(backend.as_ref()) == provider)
            .cloned()
            .unwrap_or_else(|| Arc::new(MockWAuthBackend::new(provider, "oauth-addr", "oauth-pk")));
        let strategy: Arc<dyn Strategy> = WAuthStrategy::new(backend);
        strategy
    })
}

/// Records every snapshot delivered to an observer
#[derive(Clone, Default)]
pub struct StateLog {
    states: Arc<Mutex<Vec<ConnectionState>>>,
}

impl StateLog {
    pub fn attach(manager: &WalletManager) -> Self {
        let log = Self::default();
        let sink = log.states.clone();
        manager.subscribe(move |state| sink.lock().unwrap().push(state.clone()));
        log
    }

    pub fn len(&self) -> usize {
        self.states.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<ConnectionState> {
        self.states.lock().unwrap().last().cloned()
    }
}

/// Store whose writes always fail
#[derive(Debug, Default)]
pub struct ReadOnlyStore {
    inner: MemoryStore,
}

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(WalletError::Storage(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only store",
        )))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

/// Authorizer that returns a fixed code
pub struct StaticAuthorizer;

#[async_trait]
impl OAuthAuthorizer for StaticAuthorizer {
    async fn authorize(&self, _provider: WAuthProvider) -> Result<AuthorizationCode> {
        Ok(AuthorizationCode {
            code: "auth-code".to_string(),
            code_verifier: "verifier".to_string(),
            redirect_url: "http://localhost:8090/callback".to_string(),
        })
    }
}
