/*
[INPUT]:  Strategy registry, session store, caller intents (select/connect/disconnect)
[OUTPUT]: Single live ConnectionState, cache hints, observer notifications
[POS]:    Session layer - connection-state coordinator
[UPDATE]: When transitions, reconnect policy or passthrough routing change
*/

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::http::{Result, WalletError};
use crate::strategy::{RawSigner, SignerFn, StrategyHandle, StrategyRegistry, normalize_signer};
use crate::types::{
    AuthData, Capability, ConnectedWallet, DEFAULT_PERMISSIONS, DataItemRequest, DispatchResult,
    EncryptionOptions, GatewayConfig, SignatureOptions, SignedDataItem, StrategyMetadata,
    Transaction, WalletNames,
};

use super::cache::SessionCache;
use super::observer::{ObserverList, StateCallback, Subscription};
use super::state::ConnectionState;
use super::store::KeyValueStore;

/// Wait before probing an OAuth strategy that restores itself in the background
pub const DEFAULT_RECONNECT_GRACE: Duration = Duration::from_millis(500);

/// Manager tuning
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub reconnect_grace: Duration,
    /// Permissions requested when `connect` is called without any
    pub default_permissions: Vec<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: DEFAULT_RECONNECT_GRACE,
            default_permissions: DEFAULT_PERMISSIONS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// State shared with the address watcher task
struct Shared {
    state: watch::Sender<ConnectionState>,
    observers: ObserverList,
    cache: SessionCache,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn current(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Replace the live state and notify observers in subscription order
    fn publish(&self, state: ConnectionState) {
        debug!(
            phase = ?state.phase(),
            strategy = state.strategy_id().unwrap_or("-"),
            address = state.address.as_deref().unwrap_or("-"),
            "connection state replaced"
        );
        self.state.send_replace(state.clone());
        self.observers.notify(&state);
    }

    async fn persist(&self, strategy_id: &str, address: &str) {
        if let Err(err) = self.cache.write(strategy_id, address).await {
            warn!(strategy = %strategy_id, error = %err, "failed to persist session cache");
        }
    }

    /// Back to the disconnected default with no active strategy
    async fn reset(&self, stop_watcher: bool) {
        self.publish(ConnectionState::default());
        if let Err(err) = self.cache.clear().await {
            warn!(error = %err, "failed to clear session cache");
        }
        // last: the watcher may be the task running this
        if stop_watcher {
            self.stop_watcher();
        }
    }

    fn stop_watcher(&self) {
        let task = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }

    /// React to the wallet switching accounts; returns whether to keep watching
    async fn apply_address_change(&self, handle: &StrategyHandle, change: Option<String>) -> bool {
        let current = self.current();
        let still_active = current
            .strategy
            .as_ref()
            .is_some_and(|active| active.same_instance(handle));
        if !current.connected || !still_active {
            return false;
        }

        let Some(address) = change.filter(|address| !address.is_empty()) else {
            warn!(strategy = %handle.id(), "wallet dropped its active address; disconnecting");
            if let Err(err) = handle.strategy().disconnect().await {
                warn!(strategy = %handle.id(), error = %err, "strategy disconnect failed");
            }
            self.reset(false).await;
            return false;
        };

        if current.address.as_deref() == Some(address.as_str()) {
            return true;
        }

        let public_key = match handle.strategy().get_active_public_key().await {
            Ok(key) => Some(key),
            Err(err) => {
                warn!(strategy = %handle.id(), error = %err, "cannot read public key after switch");
                None
            }
        };

        info!(strategy = %handle.id(), address = %address, "active address switched");
        self.publish(ConnectionState {
            address: Some(address.clone()),
            public_key,
            ..current
        });
        if let Err(err) = self.cache.write_address(&address).await {
            warn!(error = %err, "failed to persist switched address");
        }
        true
    }
}

/// Connection-state coordinator
///
/// Owns the registry and the single live [`ConnectionState`]. `connect`,
/// `disconnect` and `auto_reconnect` are serialized; queries are not.
pub struct WalletManager {
    shared: Arc<Shared>,
    registry: StrategyRegistry,
    config: ManagerConfig,
    op_lock: tokio::sync::Mutex<()>,
}

impl WalletManager {
    pub fn new(
        registry: StrategyRegistry,
        store: Arc<dyn KeyValueStore>,
        config: ManagerConfig,
    ) -> Self {
        let (state, _rx) = watch::channel(ConnectionState::default());
        Self {
            shared: Arc::new(Shared {
                state,
                observers: ObserverList::new(),
                cache: SessionCache::new(store),
                watcher: Mutex::new(None),
            }),
            registry,
            config,
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &SessionCache {
        &self.shared.cache
    }

    /// Current snapshot
    pub fn state(&self) -> ConnectionState {
        self.shared.current()
    }

    /// Async view of the same state stream observers receive
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        let callback: StateCallback = Arc::new(callback);
        self.shared.observers.subscribe(callback)
    }

    /// Metadata of every selectable strategy
    pub fn strategies(&self) -> Vec<StrategyMetadata> {
        self.registry.list()
    }

    pub fn active_strategy(&self) -> Option<StrategyHandle> {
        self.shared.state.borrow().strategy.clone()
    }

    /// Make `id` the active strategy; `false` if it is unknown
    ///
    /// Keeps an established session: only the active reference changes.
    pub fn select_strategy(&self, id: &str) -> bool {
        let Some(handle) = self.registry.get(id) else {
            warn!(strategy = %id, "unknown strategy");
            return false;
        };
        self.select_handle(handle);
        true
    }

    /// Like [`select_strategy`](Self::select_strategy) but reports an unknown id as an error
    pub fn set_strategy(&self, id: &str) -> Result<()> {
        if self.select_strategy(id) {
            Ok(())
        } else {
            Err(WalletError::UnknownStrategy(id.to_string()))
        }
    }

    fn select_handle(&self, handle: StrategyHandle) {
        let current = self.shared.current();
        if current
            .strategy
            .as_ref()
            .is_some_and(|active| active.same_instance(&handle))
        {
            return;
        }

        info!(strategy = %handle.id(), connected = current.connected, "strategy selected");
        // events of the previous strategy no longer describe the active one
        self.shared.stop_watcher();
        self.shared.publish(current.with_strategy(handle));
    }

    fn active(&self) -> Result<StrategyHandle> {
        self.active_strategy().ok_or(WalletError::NoStrategySelected)
    }

    fn require(&self, capability: Capability) -> Result<StrategyHandle> {
        let handle = self.active()?;
        if handle.supports(capability) {
            Ok(handle)
        } else {
            Err(WalletError::unsupported(handle.id(), capability))
        }
    }

    /// Connect the active strategy and commit the resulting session
    ///
    /// Nothing is committed unless every step succeeds.
    pub async fn connect(&self, permissions: Option<&[String]>) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.connect_locked(permissions).await
    }

    async fn connect_locked(&self, permissions: Option<&[String]>) -> Result<()> {
        let handle = self.active()?;
        let permissions = permissions
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| self.config.default_permissions.clone());

        info!(strategy = %handle.id(), "connecting");
        let strategy = handle.strategy();
        strategy.connect(&permissions).await?;
        let address = strategy.get_active_address().await?;
        let public_key = strategy.get_active_public_key().await?;
        let granted = strategy.get_permissions().await?;

        self.commit_connected(&handle, address, public_key, granted)
            .await
    }

    async fn commit_connected(
        &self,
        handle: &StrategyHandle,
        address: Option<String>,
        public_key: String,
        permissions: Vec<String>,
    ) -> Result<()> {
        let Some(address) = address.filter(|address| !address.is_empty()) else {
            warn!(strategy = %handle.id(), "connected without an address; forcing disconnect");
            if let Err(err) = handle.strategy().disconnect().await {
                warn!(strategy = %handle.id(), error = %err, "strategy disconnect failed");
            }
            self.shared.reset(true).await;
            return Err(WalletError::InvalidResponse(format!(
                "strategy '{}' reported no active address after connecting",
                handle.id()
            )));
        };

        let state = ConnectionState::connected(handle.clone(), address.clone(), public_key, permissions);
        self.shared.publish(state);
        self.shared.persist(handle.id(), &address).await;
        self.watch_addresses(handle);

        info!(strategy = %handle.id(), address = %address, "connected");
        Ok(())
    }

    fn watch_addresses(&self, handle: &StrategyHandle) {
        self.shared.stop_watcher();

        if !handle.supports(Capability::AddressEvents) {
            return;
        }
        let Some(mut events) = handle.strategy().address_events() else {
            return;
        };

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let handle = handle.clone();
        let task = tokio::spawn(async move {
            loop {
                let change = match events.recv().await {
                    Ok(change) => change,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(strategy = %handle.id(), skipped, "address events lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                if !shared.apply_address_change(&handle, change).await {
                    break;
                }
            }
            debug!(strategy = %handle.id(), "address watcher stopped");
        });

        *self
            .shared
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Disconnect the active strategy; local state and cache are reset even if the backend fails
    pub async fn disconnect(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.disconnect_locked().await
    }

    async fn disconnect_locked(&self) -> Result<()> {
        let Some(handle) = self.active_strategy() else {
            return Ok(());
        };

        let result = handle.strategy().disconnect().await;
        if let Err(err) = &result {
            warn!(strategy = %handle.id(), error = %err, "strategy disconnect failed; resetting anyway");
        }

        self.shared.reset(true).await;
        info!(strategy = %handle.id(), "disconnected");
        result
    }

    /// Restore the cached session; never fails, `false` means not connected
    pub async fn auto_reconnect(&self) -> bool {
        let _guard = self.op_lock.lock().await;
        match self.auto_reconnect_locked().await {
            Ok(restored) => restored,
            Err(err) => {
                warn!(error = %err, "auto-reconnect failed");
                false
            }
        }
    }

    async fn auto_reconnect_locked(&self) -> Result<bool> {
        let Some(record) = self.shared.cache.read().await? else {
            debug!("no cached session");
            return Ok(false);
        };

        let Some(handle) = self.registry.get(&record.strategy_id) else {
            warn!(strategy = %record.strategy_id, "cached strategy is not registered; clearing cache");
            self.shared.cache.clear().await?;
            return Ok(false);
        };
        self.select_handle(handle.clone());
        let strategy = handle.strategy();

        if handle.kind().is_oauth() {
            tokio::time::sleep(self.config.reconnect_grace).await;
            match strategy.get_active_address().await {
                Ok(Some(address)) if !address.is_empty() => {
                    let public_key = strategy.get_active_public_key().await?;
                    let permissions = strategy.get_permissions().await?;
                    self.commit_connected(&handle, Some(address), public_key, permissions)
                        .await?;
                    info!(strategy = %handle.id(), "oauth session restored");
                    return Ok(true);
                }
                Ok(_) => debug!(strategy = %handle.id(), "no session restored within grace interval"),
                Err(err) => debug!(strategy = %handle.id(), error = %err, "address probe failed"),
            }
        }

        if handle.supports(Capability::Reconnect) {
            strategy.reconnect().await?;
            let address = strategy.get_active_address().await?;
            let public_key = strategy.get_active_public_key().await?;
            let permissions = strategy.get_permissions().await?;
            self.commit_connected(&handle, address, public_key, permissions)
                .await?;
        } else {
            self.connect_locked(None).await?;
        }
        Ok(true)
    }

    /// Stop background work and drop all observers
    pub fn shutdown(&self) {
        self.shared.stop_watcher();
        self.shared.observers.clear();
    }

    pub async fn is_available(&self) -> bool {
        match self.active_strategy() {
            Some(handle) => handle.strategy().is_available().await,
            None => false,
        }
    }

    pub async fn sign(
        &self,
        transaction: Transaction,
        options: Option<SignatureOptions>,
    ) -> Result<Transaction> {
        self.active()?
            .strategy()
            .sign(transaction, options)
            .await
    }

    pub async fn sign_data_item(&self, item: DataItemRequest) -> Result<SignedDataItem> {
        self.require(Capability::SignDataItem)?
            .strategy()
            .sign_data_item(item)
            .await
    }

    pub async fn sign_ans104(&self, item: DataItemRequest) -> Result<SignedDataItem> {
        self.require(Capability::SignAns104)?
            .strategy()
            .sign_ans104(item)
            .await
    }

    pub async fn signature(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.require(Capability::Signature)?
            .strategy()
            .signature(data)
            .await
    }

    pub async fn encrypt(&self, data: &[u8], options: &EncryptionOptions) -> Result<Vec<u8>> {
        self.require(Capability::Encrypt)?
            .strategy()
            .encrypt(data, options)
            .await
    }

    pub async fn decrypt(&self, data: &[u8], options: &EncryptionOptions) -> Result<Vec<u8>> {
        self.require(Capability::Decrypt)?
            .strategy()
            .decrypt(data, options)
            .await
    }

    pub async fn get_arweave_config(&self) -> Result<GatewayConfig> {
        self.require(Capability::ArweaveConfig)?
            .strategy()
            .get_arweave_config()
            .await
    }

    pub async fn dispatch(&self, transaction: Transaction) -> Result<DispatchResult> {
        self.require(Capability::Dispatch)?
            .strategy()
            .dispatch(transaction)
            .await
    }

    pub async fn add_connected_wallet(
        &self,
        address: &str,
        public_key: &str,
        strategy: Option<&str>,
    ) -> Result<ConnectedWallet> {
        self.require(Capability::ConnectedWallets)?
            .strategy()
            .add_connected_wallet(address, public_key, strategy)
            .await
    }

    pub async fn remove_connected_wallet(&self, wallet_id: &str) -> Result<()> {
        self.require(Capability::ConnectedWallets)?
            .strategy()
            .remove_connected_wallet(wallet_id)
            .await
    }

    pub async fn get_ao_signer(&self) -> Result<SignerFn> {
        self.require(Capability::AoSigner)?
            .strategy()
            .get_ao_signer()
            .await
    }

    pub async fn get_all_addresses(&self) -> Result<Vec<String>> {
        self.active()?.strategy().get_all_addresses().await
    }

    pub async fn get_active_public_key(&self) -> Result<String> {
        self.active()?.strategy().get_active_public_key().await
    }

    pub async fn get_wallet_names(&self) -> Result<WalletNames> {
        self.active()?.strategy().get_wallet_names().await
    }

    pub async fn get_permissions(&self) -> Result<Vec<String>> {
        self.active()?.strategy().get_permissions().await
    }

    /// Best effort: `None` without a strategy or on backend failure
    pub async fn get_active_address(&self) -> Option<String> {
        let handle = self.active_strategy()?;
        match handle.strategy().get_active_address().await {
            Ok(address) => address.filter(|address| !address.is_empty()),
            Err(err) => {
                debug!(strategy = %handle.id(), error = %err, "address query failed");
                None
            }
        }
    }

    pub async fn get_email(&self) -> Option<String> {
        let handle = self.require(Capability::Email).ok()?;
        match handle.strategy().get_email().await {
            Ok(email) => email,
            Err(err) => {
                debug!(strategy = %handle.id(), error = %err, "email query failed");
                None
            }
        }
    }

    pub async fn get_username(&self) -> Option<String> {
        let handle = self.require(Capability::Username).ok()?;
        match handle.strategy().get_username().await {
            Ok(username) => username,
            Err(err) => {
                debug!(strategy = %handle.id(), error = %err, "username query failed");
                None
            }
        }
    }

    pub async fn get_connected_wallets(&self) -> Vec<ConnectedWallet> {
        let Ok(handle) = self.require(Capability::ConnectedWallets) else {
            return Vec::new();
        };
        handle
            .strategy()
            .get_connected_wallets()
            .await
            .unwrap_or_else(|err| {
                debug!(strategy = %handle.id(), error = %err, "connected wallets query failed");
                Vec::new()
            })
    }

    pub async fn get_auth_data(&self) -> Option<AuthData> {
        let handle = self.require(Capability::AuthData).ok()?;
        match handle.strategy().get_auth_data().await {
            Ok(auth) => auth,
            Err(err) => {
                debug!(strategy = %handle.id(), error = %err, "auth data query failed");
                None
            }
        }
    }

    pub fn on_auth_data_change(&self) -> Option<watch::Receiver<Option<AuthData>>> {
        self.require(Capability::AuthDataEvents)
            .ok()?
            .strategy()
            .on_auth_data_change()
    }

    /// Signing handle of the active strategy, before normalization
    pub fn get_raw_signer(&self) -> RawSigner {
        self.active_strategy()
            .map(|handle| handle.strategy().raw_signer())
            .unwrap_or(RawSigner::Absent)
    }

    /// Normalized data-item signer of the active strategy
    pub fn get_signer(&self) -> Option<SignerFn> {
        normalize_signer(self.get_raw_signer())
    }
}

impl Drop for WalletManager {
    fn drop(&mut self) {
        self.shared.stop_watcher();
    }
}
