/*
[INPUT]:  Injected Arweave browser-extension API, app info, gateway config
[OUTPUT]: Strategy that forwards every operation to the extension
[POS]:    Strategy layer - native extension backend
[UPDATE]: When the extension API surface or connect arguments change
*/

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::http::{Result, WalletError};
use crate::types::{
    AppInfo, Capability, CapabilitySet, DataItemRequest, DispatchResult, EncryptionOptions,
    GatewayConfig, SignatureOptions, SignedDataItem, StrategyKind, StrategyMetadata, Transaction,
    WalletNames,
};

use super::contract::Strategy;
use super::signer::RawSigner;

pub const NATIVE_STRATEGY_ID: &str = "wander";

/// Arweave wallet API injected by a browser extension
///
/// Every method maps one-to-one onto the extension's own call.
#[async_trait]
pub trait InjectedWallet: Send + Sync {
    fn wallet_name(&self) -> &str;

    async fn connect(
        &self,
        permissions: &[String],
        app_info: &AppInfo,
        gateway: &GatewayConfig,
    ) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn get_active_address(&self) -> Result<String>;
    async fn get_all_addresses(&self) -> Result<Vec<String>>;
    async fn get_active_public_key(&self) -> Result<String>;
    async fn sign(
        &self,
        transaction: Transaction,
        options: Option<SignatureOptions>,
    ) -> Result<Transaction>;
    async fn get_permissions(&self) -> Result<Vec<String>>;
    async fn get_wallet_names(&self) -> Result<WalletNames>;
    async fn encrypt(&self, data: &[u8], options: &EncryptionOptions) -> Result<Vec<u8>>;
    async fn decrypt(&self, data: &[u8], options: &EncryptionOptions) -> Result<Vec<u8>>;
    async fn get_arweave_config(&self) -> Result<GatewayConfig>;
    async fn dispatch(&self, transaction: Transaction) -> Result<DispatchResult>;
    async fn sign_data_item(&self, item: DataItemRequest) -> Result<SignedDataItem>;
    async fn signature(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// `walletSwitch` events, when the extension emits them
    fn address_events(&self) -> Option<broadcast::Receiver<Option<String>>> {
        None
    }
}

/// Strategy over an injected browser extension
pub struct NativeExtensionStrategy {
    metadata: StrategyMetadata,
    wallet: Option<Arc<dyn InjectedWallet>>,
    app_info: AppInfo,
    gateway: GatewayConfig,
}

impl NativeExtensionStrategy {
    /// Create the strategy; `wallet` is `None` when no extension was injected
    pub fn new(
        wallet: Option<Arc<dyn InjectedWallet>>,
        app_info: AppInfo,
        gateway: GatewayConfig,
    ) -> Self {
        Self {
            metadata: StrategyMetadata {
                id: NATIVE_STRATEGY_ID.to_string(),
                name: "Wander".to_string(),
                description: "Non-custodial Arweave wallet for your favorite browser".to_string(),
                theme: "235, 224, 255".to_string(),
                logo: "assets/wander.svg".to_string(),
                url: "https://wander.app".to_string(),
                kind: StrategyKind::NativeExtension,
            },
            wallet,
            app_info,
            gateway,
        }
    }

    fn wallet(&self) -> Result<&Arc<dyn InjectedWallet>> {
        self.wallet.as_ref().ok_or_else(|| {
            WalletError::Unavailable(format!("{} extension is not installed", self.metadata.name))
        })
    }
}

#[async_trait]
impl Strategy for NativeExtensionStrategy {
    fn metadata(&self) -> &StrategyMetadata {
        &self.metadata
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(&[
            Capability::Encrypt,
            Capability::Decrypt,
            Capability::ArweaveConfig,
            Capability::Dispatch,
            Capability::SignDataItem,
            Capability::SignAns104,
            Capability::Signature,
            Capability::AddressEvents,
        ])
    }

    async fn is_available(&self) -> bool {
        self.wallet.is_some()
    }

    async fn connect(&self, permissions: &[String]) -> Result<()> {
        let wallet = self.wallet()?;
        debug!(
            strategy = NATIVE_STRATEGY_ID,
            permissions = permissions.len(),
            app = %self.app_info.name,
            "requesting extension permissions"
        );
        wallet.connect(permissions, &self.app_info, &self.gateway).await
    }

    async fn disconnect(&self) -> Result<()> {
        self.wallet()?.disconnect().await
    }

    async fn get_active_address(&self) -> Result<Option<String>> {
        let address = self.wallet()?.get_active_address().await?;
        Ok(Some(address).filter(|address| !address.is_empty()))
    }

    async fn get_all_addresses(&self) -> Result<Vec<String>> {
        self.wallet()?.get_all_addresses().await
    }

    async fn get_active_public_key(&self) -> Result<String> {
        self.wallet()?.get_active_public_key().await
    }

    async fn sign(
        &self,
        transaction: Transaction,
        options: Option<SignatureOptions>,
    ) -> Result<Transaction> {
        self.wallet()?.sign(transaction, options).await
    }

    async fn get_permissions(&self) -> Result<Vec<String>> {
        self.wallet()?.get_permissions().await
    }

    async fn get_wallet_names(&self) -> Result<WalletNames> {
        self.wallet()?.get_wallet_names().await
    }

    fn raw_signer(&self) -> RawSigner {
        match &self.wallet {
            Some(wallet) => RawSigner::Object(wallet.clone()),
            None => RawSigner::Absent,
        }
    }

    async fn encrypt(&self, data: &[u8], options: &EncryptionOptions) -> Result<Vec<u8>> {
        self.wallet()?.encrypt(data, options).await
    }

    async fn decrypt(&self, data: &[u8], options: &EncryptionOptions) -> Result<Vec<u8>> {
        self.wallet()?.decrypt(data, options).await
    }

    async fn get_arweave_config(&self) -> Result<GatewayConfig> {
        self.wallet()?.get_arweave_config().await
    }

    async fn dispatch(&self, transaction: Transaction) -> Result<DispatchResult> {
        self.wallet()?.dispatch(transaction).await
    }

    async fn sign_data_item(&self, item: DataItemRequest) -> Result<SignedDataItem> {
        self.wallet()?.sign_data_item(item).await
    }

    async fn sign_ans104(&self, item: DataItemRequest) -> Result<SignedDataItem> {
        self.wallet()?.sign_data_item(item).await
    }

    async fn signature(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.wallet()?.signature(data).await
    }

    fn address_events(&self) -> Option<broadcast::Receiver<Option<String>>> {
        self.wallet.as_ref()?.address_events()
    }
}

/// In-memory extension for tests and demos
///
/// Echoes payloads back, records call counts, and can emit address switches.
pub struct MockInjectedWallet {
    address: Mutex<String>,
    public_key: String,
    permissions: Mutex<Vec<String>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    events: broadcast::Sender<Option<String>>,
}

impl MockInjectedWallet {
    pub fn new(address: &str, public_key: &str) -> Self {
        let (events, _rx) = broadcast::channel(16);
        Self {
            address: Mutex::new(address.to_string()),
            public_key: public_key.to_string(),
            permissions: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Number of times `method` was invoked
    pub fn calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    /// Simulate the user switching (or removing, with `None`) the active wallet
    pub fn switch_address(&self, address: Option<&str>) {
        *self.address.lock().unwrap_or_else(PoisonError::into_inner) =
            address.unwrap_or_default().to_string();
        let _ = self.events.send(address.map(str::to_string));
    }

    fn record(&self, method: &'static str) {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method)
            .or_insert(0) += 1;
    }

    fn current_address(&self) -> String {
        self.address
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl InjectedWallet for MockInjectedWallet {
    fn wallet_name(&self) -> &str {
        "mock-extension"
    }

    async fn connect(
        &self,
        permissions: &[String],
        _app_info: &AppInfo,
        _gateway: &GatewayConfig,
    ) -> Result<()> {
        self.record("connect");
        *self.permissions.lock().unwrap_or_else(PoisonError::into_inner) = permissions.to_vec();
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect");
        self.permissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    async fn get_active_address(&self) -> Result<String> {
        self.record("get_active_address");
        Ok(self.current_address())
    }

    async fn get_all_addresses(&self) -> Result<Vec<String>> {
        self.record("get_all_addresses");
        Ok(vec![self.current_address()])
    }

    async fn get_active_public_key(&self) -> Result<String> {
        self.record("get_active_public_key");
        Ok(self.public_key.clone())
    }

    async fn sign(
        &self,
        mut transaction: Transaction,
        _options: Option<SignatureOptions>,
    ) -> Result<Transaction> {
        self.record("sign");
        transaction.owner = self.public_key.clone();
        transaction.signature = "mock-signature".to_string();
        transaction.id = "mock-id".to_string();
        Ok(transaction)
    }

    async fn get_permissions(&self) -> Result<Vec<String>> {
        self.record("get_permissions");
        Ok(self
            .permissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn get_wallet_names(&self) -> Result<WalletNames> {
        self.record("get_wallet_names");
        Ok(WalletNames::from([(self.current_address(), "Mock".to_string())]))
    }

    async fn encrypt(&self, data: &[u8], _options: &EncryptionOptions) -> Result<Vec<u8>> {
        self.record("encrypt");
        Ok(data.iter().rev().copied().collect())
    }

    async fn decrypt(&self, data: &[u8], _options: &EncryptionOptions) -> Result<Vec<u8>> {
        self.record("decrypt");
        Ok(data.iter().rev().copied().collect())
    }

    async fn get_arweave_config(&self) -> Result<GatewayConfig> {
        self.record("get_arweave_config");
        Ok(GatewayConfig::default())
    }

    async fn dispatch(&self, _transaction: Transaction) -> Result<DispatchResult> {
        self.record("dispatch");
        Ok(DispatchResult {
            id: "mock-dispatch".to_string(),
            kind: Some("BUNDLED".to_string()),
        })
    }

    async fn sign_data_item(&self, item: DataItemRequest) -> Result<SignedDataItem> {
        self.record("sign_data_item");
        Ok(SignedDataItem {
            id: "mock-item".to_string(),
            raw: item.data,
        })
    }

    async fn signature(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.record("signature");
        Ok(data.to_vec())
    }

    fn address_events(&self) -> Option<broadcast::Receiver<Option<String>>> {
        Some(self.events.subscribe())
    }
}
