/*
[INPUT]:  Wallet backend transports (extension APIs, OAuth SDKs)
[OUTPUT]: Uniform async operations the manager drives
[POS]:    Strategy layer - capability contract every backend implements
[UPDATE]: When adding required operations or new optional capabilities
*/

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::http::{Result, WalletError};
use crate::types::{
    AuthData, Capability, CapabilitySet, ConnectedWallet, DataItemRequest, DispatchResult,
    EncryptionOptions, GatewayConfig, SignatureOptions, SignedDataItem, StrategyKind,
    StrategyMetadata, Transaction, WalletNames,
};

use super::signer::{RawSigner, SignerFn};

/// Capability contract for a wallet backend
///
/// The required set is implemented by every backend. Optional operations are
/// advertised through [`Strategy::capabilities`]; their default bodies report
/// [`WalletError::CapabilityUnsupported`] so an undeclared operation can never
/// reach a transport. Callers branch on the descriptor, not on the error.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Display metadata, including the stable id
    fn metadata(&self) -> &StrategyMetadata;

    /// Optional operations this backend offers
    fn capabilities(&self) -> CapabilitySet;

    fn id(&self) -> &str {
        &self.metadata().id
    }

    fn kind(&self) -> StrategyKind {
        self.metadata().kind
    }

    /// Whether the underlying transport can be used in this environment
    async fn is_available(&self) -> bool;

    async fn connect(&self, permissions: &[String]) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Active address, `None` while the backend holds no session
    async fn get_active_address(&self) -> Result<Option<String>>;

    async fn get_all_addresses(&self) -> Result<Vec<String>>;

    async fn get_active_public_key(&self) -> Result<String>;

    async fn sign(
        &self,
        transaction: Transaction,
        options: Option<SignatureOptions>,
    ) -> Result<Transaction>;

    async fn get_permissions(&self) -> Result<Vec<String>>;

    async fn get_wallet_names(&self) -> Result<WalletNames>;

    /// Backend-native signing handle before normalization
    fn raw_signer(&self) -> RawSigner;

    fn unsupported(&self, capability: Capability) -> WalletError {
        WalletError::unsupported(self.id(), capability)
    }

    async fn encrypt(&self, _data: &[u8], _options: &EncryptionOptions) -> Result<Vec<u8>> {
        Err(self.unsupported(Capability::Encrypt))
    }

    async fn decrypt(&self, _data: &[u8], _options: &EncryptionOptions) -> Result<Vec<u8>> {
        Err(self.unsupported(Capability::Decrypt))
    }

    async fn get_arweave_config(&self) -> Result<GatewayConfig> {
        Err(self.unsupported(Capability::ArweaveConfig))
    }

    async fn dispatch(&self, _transaction: Transaction) -> Result<DispatchResult> {
        Err(self.unsupported(Capability::Dispatch))
    }

    async fn sign_data_item(&self, _item: DataItemRequest) -> Result<SignedDataItem> {
        Err(self.unsupported(Capability::SignDataItem))
    }

    /// ao-style signing of an ANS-104 item
    async fn sign_ans104(&self, _item: DataItemRequest) -> Result<SignedDataItem> {
        Err(self.unsupported(Capability::SignAns104))
    }

    /// Raw signature over arbitrary bytes
    async fn signature(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Err(self.unsupported(Capability::Signature))
    }

    /// Stream of active-address changes; `None` inside means the wallet dropped the session
    fn address_events(&self) -> Option<broadcast::Receiver<Option<String>>> {
        None
    }

    async fn get_email(&self) -> Result<Option<String>> {
        Err(self.unsupported(Capability::Email))
    }

    async fn get_username(&self) -> Result<Option<String>> {
        Err(self.unsupported(Capability::Username))
    }

    async fn add_connected_wallet(
        &self,
        _address: &str,
        _public_key: &str,
        _strategy: Option<&str>,
    ) -> Result<ConnectedWallet> {
        Err(self.unsupported(Capability::ConnectedWallets))
    }

    async fn remove_connected_wallet(&self, _wallet_id: &str) -> Result<()> {
        Err(self.unsupported(Capability::ConnectedWallets))
    }

    async fn get_connected_wallets(&self) -> Result<Vec<ConnectedWallet>> {
        Err(self.unsupported(Capability::ConnectedWallets))
    }

    async fn get_auth_data(&self) -> Result<Option<AuthData>> {
        Err(self.unsupported(Capability::AuthData))
    }

    fn on_auth_data_change(&self) -> Option<watch::Receiver<Option<AuthData>>> {
        None
    }

    /// Restore a previous backend session without a fresh user prompt
    async fn reconnect(&self) -> Result<()> {
        Err(self.unsupported(Capability::Reconnect))
    }

    async fn get_ao_signer(&self) -> Result<SignerFn> {
        Err(self.unsupported(Capability::AoSigner))
    }
}

/// Registered strategy plus the capability descriptor captured at registration
#[derive(Clone)]
pub struct StrategyHandle {
    strategy: Arc<dyn Strategy>,
    capabilities: CapabilitySet,
}

impl StrategyHandle {
    pub fn new(strategy: Arc<dyn Strategy>) -> Self {
        let capabilities = strategy.capabilities();
        Self {
            strategy,
            capabilities,
        }
    }

    pub fn id(&self) -> &str {
        self.strategy.id()
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Identity comparison: same registry instance
    pub fn same_instance(&self, other: &StrategyHandle) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.strategy), Arc::as_ptr(&other.strategy))
    }
}

impl PartialEq for StrategyHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other)
    }
}

impl fmt::Debug for StrategyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyHandle")
            .field("id", &self.id())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
