/*
[INPUT]:  Scripted behavior (capabilities, failing steps, address, delays)
[OUTPUT]: In-memory Strategy implementation that records every call
[POS]:    Strategy layer - test double for manager and registry tests
[UPDATE]: When the Strategy contract gains operations
*/

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::http::{Result, WalletError};
use crate::types::{
    Capability, CapabilitySet, DataItemRequest, EncryptionOptions, SignatureOptions,
    SignedDataItem, StrategyKind, StrategyMetadata, Transaction, WalletNames,
};

use super::contract::Strategy;
use super::signer::{RawSigner, SignerFn, SignerFuture};

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    permissions: Vec<String>,
}

/// Strategy double with no transport behind it
///
/// Declares no optional operations unless built with
/// [`MockStrategy::with_capabilities`]; undeclared operations fail with
/// `CapabilityUnsupported` exactly like a real backend.
pub struct MockStrategy {
    metadata: StrategyMetadata,
    capabilities: CapabilitySet,
    address: Option<String>,
    public_key: String,
    failing: HashSet<&'static str>,
    connect_delay: Option<Duration>,
    state: Mutex<MockState>,
    calls: Mutex<HashMap<&'static str, usize>>,
    events: broadcast::Sender<Option<String>>,
}

impl MockStrategy {
    pub fn new(id: &str) -> Self {
        let (events, _rx) = broadcast::channel(16);
        Self {
            metadata: StrategyMetadata {
                id: id.to_string(),
                name: format!("Mock {id}"),
                description: "Scripted wallet".to_string(),
                theme: "0, 0, 0".to_string(),
                logo: String::new(),
                url: String::new(),
                kind: StrategyKind::NativeExtension,
            },
            capabilities: CapabilitySet::default(),
            address: Some(format!("{id}-address")),
            public_key: format!("{id}-public-key"),
            failing: HashSet::new(),
            connect_delay: None,
            state: Mutex::new(MockState::default()),
            calls: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn with_kind(mut self, kind: StrategyKind) -> Self {
        self.metadata.kind = kind;
        self
    }

    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = CapabilitySet::new(capabilities);
        self
    }

    /// Address reported once connected; `None` simulates a wallet with no account
    pub fn with_address(mut self, address: Option<&str>) -> Self {
        self.address = address.map(str::to_string);
        self
    }

    /// Make the named operation fail with a backend error
    pub fn failing_on(mut self, method: &'static str) -> Self {
        self.failing.insert(method);
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Start in a connected state, as if the backend kept a session
    pub fn already_connected(self) -> Self {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connected = true;
        self
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    /// Total backend calls, excluding metadata accessors
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    pub fn is_connected(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connected
    }

    /// Broadcast an address change on the address-events stream
    pub fn emit_address(&self, address: Option<&str>) {
        let _ = self.events.send(address.map(str::to_string));
    }

    fn record(&self, method: &'static str) -> Result<()> {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method)
            .or_insert(0) += 1;

        if self.failing.contains(method) {
            return Err(WalletError::backend(
                &self.metadata.id,
                format!("{method} failed"),
            ));
        }
        Ok(())
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.capabilities.contains(capability) {
            Ok(())
        } else {
            Err(self.unsupported(capability))
        }
    }

    fn echo_signer() -> SignerFn {
        Arc::new(|item: DataItemRequest| -> SignerFuture {
            Box::pin(async move {
                Ok(SignedDataItem {
                    id: "mock-signed".to_string(),
                    raw: item.data,
                })
            })
        })
    }
}

#[async_trait]
impl Strategy for MockStrategy {
    fn metadata(&self) -> &StrategyMetadata {
        &self.metadata
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.clone()
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn connect(&self, permissions: &[String]) -> Result<()> {
        self.record("connect")?;
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.connected = true;
        state.permissions = permissions.to_vec();
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let result = self.record("disconnect");
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.connected = false;
        state.permissions.clear();
        result
    }

    async fn get_active_address(&self) -> Result<Option<String>> {
        self.record("get_active_address")?;
        Ok(self.is_connected().then(|| self.address.clone()).flatten())
    }

    async fn get_all_addresses(&self) -> Result<Vec<String>> {
        self.record("get_all_addresses")?;
        Ok(self.get_active_address().await?.into_iter().collect())
    }

    async fn get_active_public_key(&self) -> Result<String> {
        self.record("get_active_public_key")?;
        Ok(self.public_key.clone())
    }

    async fn sign(
        &self,
        mut transaction: Transaction,
        _options: Option<SignatureOptions>,
    ) -> Result<Transaction> {
        self.record("sign")?;
        transaction.owner = self.public_key.clone();
        transaction.signature = "mock-signature".to_string();
        transaction.id = "mock-id".to_string();
        Ok(transaction)
    }

    async fn get_permissions(&self) -> Result<Vec<String>> {
        self.record("get_permissions")?;
        Ok(self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .permissions
            .clone())
    }

    async fn get_wallet_names(&self) -> Result<WalletNames> {
        self.record("get_wallet_names")?;
        Ok(self
            .address
            .iter()
            .map(|address| (address.clone(), self.metadata.name.clone()))
            .collect())
    }

    fn raw_signer(&self) -> RawSigner {
        if self.is_connected() {
            RawSigner::Function(Self::echo_signer())
        } else {
            RawSigner::Absent
        }
    }

    async fn encrypt(&self, data: &[u8], _options: &EncryptionOptions) -> Result<Vec<u8>> {
        self.require(Capability::Encrypt)?;
        self.record("encrypt")?;
        Ok(data.iter().rev().copied().collect())
    }

    async fn decrypt(&self, data: &[u8], _options: &EncryptionOptions) -> Result<Vec<u8>> {
        self.require(Capability::Decrypt)?;
        self.record("decrypt")?;
        Ok(data.iter().rev().copied().collect())
    }

    async fn sign_data_item(&self, item: DataItemRequest) -> Result<SignedDataItem> {
        self.require(Capability::SignDataItem)?;
        self.record("sign_data_item")?;
        Self::echo_signer()(item).await
    }

    async fn signature(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.require(Capability::Signature)?;
        self.record("signature")?;
        Ok(data.to_vec())
    }

    fn address_events(&self) -> Option<broadcast::Receiver<Option<String>>> {
        self.capabilities
            .contains(Capability::AddressEvents)
            .then(|| self.events.subscribe())
    }

    async fn get_email(&self) -> Result<Option<String>> {
        self.require(Capability::Email)?;
        self.record("get_email")?;
        Ok(Some(format!("{}@mock.example", self.metadata.id)))
    }

    async fn reconnect(&self) -> Result<()> {
        self.require(Capability::Reconnect)?;
        self.record("reconnect")?;
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connected = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_address_requires_connection() {
        let mock = MockStrategy::new("m");
        assert_eq!(mock.get_active_address().await.unwrap(), None);

        mock.connect(&[]).await.unwrap();
        assert_eq!(
            mock.get_active_address().await.unwrap().as_deref(),
            Some("m-address")
        );
        assert_eq!(mock.calls("get_active_address"), 2);
    }

    #[tokio::test]
    async fn test_failing_step() {
        let mock = MockStrategy::new("m").failing_on("connect");
        assert!(mock.connect(&[]).await.is_err());
        assert!(!mock.is_connected());
    }

    #[tokio::test]
    async fn test_declared_capability_is_served() {
        let mock = MockStrategy::new("m").with_capabilities(&[Capability::Signature]);
        assert_eq!(mock.signature(b"abc").await.unwrap(), b"abc".to_vec());
        let err = mock
            .encrypt(b"abc", &EncryptionOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_capability_error());
    }
}
