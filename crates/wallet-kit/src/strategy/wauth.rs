/*
[INPUT]:  OAuth provider choice and an authenticated WAuth backend
[OUTPUT]: Custodial wallet strategy with session self-restore and auth-data events
[POS]:    Strategy layer - OAuth (WAuth) backend, one instance per provider
[UPDATE]: When the WAuth backend surface or session restore rules change
*/

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::http::{Result, WalletError};
use crate::types::{
    AuthData, Capability, CapabilitySet, ConnectedWallet, DEFAULT_PERMISSIONS, DataItemRequest,
    SignatureOptions, SignedDataItem, StrategyKind, StrategyMetadata, Transaction, WAuthProvider,
    WalletNames,
};

use super::contract::Strategy;
use super::signer::{RawSigner, SignerFn, SignerFuture};

/// Namespace of lazily created OAuth strategy ids
pub const WAUTH_PREFIX: &str = "wauth-";

/// Strategy id for a provider, e.g. `wauth-google`
pub fn wauth_strategy_id(provider: WAuthProvider) -> String {
    format!("{WAUTH_PREFIX}{}", provider.as_str())
}

/// Provider of a `wauth-<provider>` id; the suffix must match exactly
pub fn provider_from_id(id: &str) -> Option<WAuthProvider> {
    let suffix = id.strip_prefix(WAUTH_PREFIX)?;
    WAuthProvider::ALL
        .into_iter()
        .find(|provider| provider.as_str() == suffix)
}

/// Display metadata for a provider, available without creating the strategy
pub fn metadata_for(provider: WAuthProvider) -> StrategyMetadata {
    let theme = match provider {
        WAuthProvider::Google => "66, 133, 244",
        WAuthProvider::Github => "36, 41, 47",
        WAuthProvider::Discord => "88, 101, 242",
        WAuthProvider::X => "0, 0, 0",
    };

    StrategyMetadata {
        id: wauth_strategy_id(provider),
        name: provider.display_name().to_string(),
        description: format!("Sign in with {} to use a WAuth wallet", provider.display_name()),
        theme: theme.to_string(),
        logo: format!("assets/{}.svg", provider.as_str()),
        url: "https://wauth.arweave.net".to_string(),
        kind: StrategyKind::OAuthProvider(provider),
    }
}

/// Custodial wallet attached to a WAuth account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WAuthWallet {
    pub address: String,
    pub public_key: String,
}

/// OAuth2 authorization result handed to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub code_verifier: String,
    pub redirect_url: String,
}

/// Runs the interactive part of an OAuth2 login (browser popup, device flow)
#[async_trait]
pub trait OAuthAuthorizer: Send + Sync {
    async fn authorize(&self, provider: WAuthProvider) -> Result<AuthorizationCode>;
}

/// Surface of the WAuth SDK a strategy drives
///
/// One backend instance serves exactly one provider.
#[async_trait]
pub trait WAuthBackend: Send + Sync {
    fn provider(&self) -> WAuthProvider;

    /// Resume a persisted session without user interaction
    async fn restore_session(&self) -> Result<Option<AuthData>>;

    /// Interactive login
    async fn authenticate(&self) -> Result<AuthData>;

    async fn logout(&self) -> Result<()>;

    /// Wallet of the authenticated account, `None` if it has none yet
    async fn wallet(&self) -> Result<Option<WAuthWallet>>;

    async fn sign(
        &self,
        transaction: Transaction,
        options: Option<SignatureOptions>,
    ) -> Result<Transaction>;

    async fn sign_data_item(&self, item: DataItemRequest) -> Result<SignedDataItem>;

    async fn signature(&self, data: &[u8]) -> Result<Vec<u8>>;

    async fn connected_wallets(&self) -> Result<Vec<ConnectedWallet>>;

    async fn add_connected_wallet(
        &self,
        address: &str,
        public_key: &str,
        strategy: Option<&str>,
    ) -> Result<ConnectedWallet>;

    async fn remove_connected_wallet(&self, wallet_id: &str) -> Result<()>;
}

/// OAuth-backed strategy for a single provider
pub struct WAuthStrategy {
    metadata: StrategyMetadata,
    backend: Arc<dyn WAuthBackend>,
    session: watch::Sender<Option<AuthData>>,
    wallet: RwLock<Option<WAuthWallet>>,
    permissions: RwLock<Vec<String>>,
}

impl WAuthStrategy {
    /// Create the strategy and, inside a tokio runtime, start restoring any persisted session
    pub fn new(backend: Arc<dyn WAuthBackend>) -> Arc<Self> {
        let (session, _rx) = watch::channel(None);
        let strategy = Arc::new(Self {
            metadata: metadata_for(backend.provider()),
            backend,
            session,
            wallet: RwLock::new(None),
            permissions: RwLock::new(Vec::new()),
        });

        if Handle::try_current().is_ok() {
            let restoring = Arc::clone(&strategy);
            tokio::spawn(async move {
                if let Err(err) = restoring.restore().await {
                    warn!(strategy = %restoring.metadata.id, error = %err, "session restore failed");
                }
            });
        } else {
            debug!(strategy = %strategy.metadata.id, "no runtime; session restore deferred");
        }

        strategy
    }

    pub fn provider(&self) -> WAuthProvider {
        self.backend.provider()
    }

    /// Pull a persisted session from the backend; `true` if one was found
    pub async fn restore(&self) -> Result<bool> {
        let Some(auth) = self.backend.restore_session().await? else {
            return Ok(false);
        };
        let wallet = self.backend.wallet().await?;

        info!(
            strategy = %self.metadata.id,
            user = %auth.user_id,
            has_wallet = wallet.is_some(),
            "wauth session restored"
        );
        *self.wallet.write().unwrap_or_else(PoisonError::into_inner) = wallet;
        self.session.send_replace(Some(auth));
        Ok(true)
    }

    fn session(&self) -> Option<AuthData> {
        self.session.borrow().clone()
    }

    fn wallet(&self) -> Option<WAuthWallet> {
        if self.session.borrow().is_none() {
            return None;
        }
        self.wallet
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn require_wallet(&self) -> Result<WAuthWallet> {
        self.wallet()
            .ok_or_else(|| WalletError::backend(&self.metadata.id, "not signed in"))
    }

    fn session_signer(&self) -> SignerFn {
        let backend = self.backend.clone();
        Arc::new(move |item: DataItemRequest| -> SignerFuture {
            let backend = backend.clone();
            Box::pin(async move { backend.sign_data_item(item).await })
        })
    }
}

#[async_trait]
impl Strategy for WAuthStrategy {
    fn metadata(&self) -> &StrategyMetadata {
        &self.metadata
    }

    fn capabilities(&self) -> CapabilitySet {
        Capability::OAUTH
            .iter()
            .copied()
            .chain([
                Capability::SignDataItem,
                Capability::SignAns104,
                Capability::Signature,
            ])
            .collect()
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn connect(&self, permissions: &[String]) -> Result<()> {
        let auth = self.backend.authenticate().await?;
        let wallet = self.backend.wallet().await?.ok_or_else(|| {
            WalletError::backend(&self.metadata.id, "account has no wallet")
        })?;

        let permissions = if permissions.is_empty() {
            DEFAULT_PERMISSIONS.iter().map(|p| p.to_string()).collect()
        } else {
            permissions.to_vec()
        };

        info!(strategy = %self.metadata.id, user = %auth.user_id, address = %wallet.address, "wauth connected");
        *self.wallet.write().unwrap_or_else(PoisonError::into_inner) = Some(wallet);
        *self.permissions.write().unwrap_or_else(PoisonError::into_inner) = permissions;
        self.session.send_replace(Some(auth));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let result = self.backend.logout().await;

        *self.wallet.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.permissions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.session.send_replace(None);
        result
    }

    async fn get_active_address(&self) -> Result<Option<String>> {
        Ok(self.wallet().map(|wallet| wallet.address))
    }

    async fn get_all_addresses(&self) -> Result<Vec<String>> {
        Ok(self.wallet().map(|wallet| wallet.address).into_iter().collect())
    }

    async fn get_active_public_key(&self) -> Result<String> {
        Ok(self.require_wallet()?.public_key)
    }

    async fn sign(
        &self,
        transaction: Transaction,
        options: Option<SignatureOptions>,
    ) -> Result<Transaction> {
        self.require_wallet()?;
        self.backend.sign(transaction, options).await
    }

    async fn get_permissions(&self) -> Result<Vec<String>> {
        if self.session.borrow().is_none() {
            return Ok(Vec::new());
        }

        let granted = self
            .permissions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if granted.is_empty() {
            // restored sessions carry the default grant
            return Ok(DEFAULT_PERMISSIONS.iter().map(|p| p.to_string()).collect());
        }
        Ok(granted)
    }

    async fn get_wallet_names(&self) -> Result<WalletNames> {
        Ok(self
            .wallet()
            .map(|wallet| {
                WalletNames::from([(
                    wallet.address,
                    format!("{} wallet", self.provider().display_name()),
                )])
            })
            .unwrap_or_default())
    }

    fn raw_signer(&self) -> RawSigner {
        if self.session.borrow().is_none() {
            return RawSigner::Absent;
        }
        RawSigner::Function(self.session_signer())
    }

    async fn sign_data_item(&self, item: DataItemRequest) -> Result<SignedDataItem> {
        self.require_wallet()?;
        self.backend.sign_data_item(item).await
    }

    async fn sign_ans104(&self, item: DataItemRequest) -> Result<SignedDataItem> {
        self.require_wallet()?;
        self.backend.sign_data_item(item).await
    }

    async fn signature(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.require_wallet()?;
        self.backend.signature(data).await
    }

    async fn get_email(&self) -> Result<Option<String>> {
        Ok(self.session().and_then(|auth| auth.email))
    }

    async fn get_username(&self) -> Result<Option<String>> {
        Ok(self.session().and_then(|auth| auth.username))
    }

    async fn add_connected_wallet(
        &self,
        address: &str,
        public_key: &str,
        strategy: Option<&str>,
    ) -> Result<ConnectedWallet> {
        self.backend
            .add_connected_wallet(address, public_key, strategy)
            .await
    }

    async fn remove_connected_wallet(&self, wallet_id: &str) -> Result<()> {
        self.backend.remove_connected_wallet(wallet_id).await
    }

    async fn get_connected_wallets(&self) -> Result<Vec<ConnectedWallet>> {
        self.backend.connected_wallets().await
    }

    async fn get_auth_data(&self) -> Result<Option<AuthData>> {
        Ok(self.session())
    }

    fn on_auth_data_change(&self) -> Option<watch::Receiver<Option<AuthData>>> {
        Some(self.session.subscribe())
    }

    async fn reconnect(&self) -> Result<()> {
        if self.restore().await? {
            Ok(())
        } else {
            Err(WalletError::backend(&self.metadata.id, "no session to restore"))
        }
    }

    async fn get_ao_signer(&self) -> Result<SignerFn> {
        self.require_wallet()?;
        Ok(self.session_signer())
    }
}

/// Scripted WAuth backend for tests and demos
///
/// Starts signed out unless [`MockWAuthBackend::with_persisted_session`] is used.
pub struct MockWAuthBackend {
    provider: WAuthProvider,
    wallet: WAuthWallet,
    persisted: Mutex<Option<AuthData>>,
    connected: Mutex<Vec<ConnectedWallet>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockWAuthBackend {
    pub fn new(provider: WAuthProvider, address: &str, public_key: &str) -> Self {
        Self {
            provider,
            wallet: WAuthWallet {
                address: address.to_string(),
                public_key: public_key.to_string(),
            },
            persisted: Mutex::new(None),
            connected: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Pretend a previous login left a session behind
    pub fn with_persisted_session(self) -> Self {
        *self.persisted.lock().unwrap_or_else(PoisonError::into_inner) = Some(self.auth_data());
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

    fn record(&self, method: &'static str) {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method)
            .or_insert(0) += 1;
    }

    fn auth_data(&self) -> AuthData {
        AuthData {
            user_id: format!("user-{}", self.provider.as_str()),
            email: Some(format!("tester@{}.example", self.provider.as_str())),
            username: Some("tester".to_string()),
            provider: self.provider.as_str().to_string(),
        }
    }

    fn signed_in(&self) -> bool {
        self.persisted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[async_trait]
impl WAuthBackend for MockWAuthBackend {
    fn provider(&self) -> WAuthProvider {
        self.provider
    }

    async fn restore_session(&self) -> Result<Option<AuthData>> {
        self.record("restore_session");
        Ok(self
            .persisted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn authenticate(&self) -> Result<AuthData> {
        self.record("authenticate");
        let auth = self.auth_data();
        *self.persisted.lock().unwrap_or_else(PoisonError::into_inner) = Some(auth.clone());
        Ok(auth)
    }

    async fn logout(&self) -> Result<()> {
        self.record("logout");
        *self.persisted.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    async fn wallet(&self) -> Result<Option<WAuthWallet>> {
        self.record("wallet");
        Ok(self.signed_in().then(|| self.wallet.clone()))
    }

    async fn sign(
        &self,
        mut transaction: Transaction,
        _options: Option<SignatureOptions>,
    ) -> Result<Transaction> {
        self.record("sign");
        transaction.owner = self.wallet.public_key.clone();
        transaction.signature = "wauth-signature".to_string();
        transaction.id = "wauth-id".to_string();
        Ok(transaction)
    }

    async fn sign_data_item(&self, item: DataItemRequest) -> Result<SignedDataItem> {
        self.record("sign_data_item");
        Ok(SignedDataItem {
            id: "wauth-item".to_string(),
            raw: item.data,
        })
    }

    async fn signature(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.record("signature");
        Ok(data.to_vec())
    }

    async fn connected_wallets(&self) -> Result<Vec<ConnectedWallet>> {
        self.record("connected_wallets");
        Ok(self
            .connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn add_connected_wallet(
        &self,
        address: &str,
        public_key: &str,
        strategy: Option<&str>,
    ) -> Result<ConnectedWallet> {
        self.record("add_connected_wallet");
        let mut connected = self.connected.lock().unwrap_or_else(PoisonError::into_inner);
        let wallet = ConnectedWallet {
            id: format!("cw-{}", connected.len() + 1),
            address: address.to_string(),
            public_key: public_key.to_string(),
            strategy: strategy.map(str::to_string),
        };
        connected.push(wallet.clone());
        Ok(wallet)
    }

    async fn remove_connected_wallet(&self, wallet_id: &str) -> Result<()> {
        self.record("remove_connected_wallet");
        self.connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|wallet| wallet.id != wallet_id);
        Ok(())
    }
}
