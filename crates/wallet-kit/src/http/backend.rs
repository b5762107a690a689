/*
[INPUT]:  WAuthClient, an OAuth authorizer and the session key-value store
[OUTPUT]: WAuthBackend over HTTP with a persisted, refreshable auth token
[POS]:    HTTP layer - bridge between WAuthStrategy and the WAuth API
[UPDATE]: When token persistence or session restore rules change
*/

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::http::{Result, WAuthClient};
use crate::http::auth::AuthResponse;
use crate::session::KeyValueStore;
use crate::strategy::{OAuthAuthorizer, WAuthBackend, WAuthWallet};
use crate::types::{
    AuthData, ConnectedWallet, DataItemRequest, SignatureOptions, SignedDataItem, Transaction,
    WAuthProvider,
};

/// Store key holding the auth token of a provider
pub fn token_key(provider: WAuthProvider) -> String {
    format!("wauth.token.{}", provider.as_str())
}

/// Persisted token record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    pub token: String,
    pub saved_at: DateTime<Utc>,
}

/// WAuth backend talking to the HTTP API
pub struct HttpWAuthBackend {
    provider: WAuthProvider,
    client: WAuthClient,
    authorizer: Arc<dyn OAuthAuthorizer>,
    store: Arc<dyn KeyValueStore>,
}

impl HttpWAuthBackend {
    pub fn new(
        provider: WAuthProvider,
        client: WAuthClient,
        authorizer: Arc<dyn OAuthAuthorizer>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            provider,
            client,
            authorizer,
            store,
        }
    }

    pub fn client(&self) -> &WAuthClient {
        &self.client
    }

    async fn load_token(&self) -> Result<Option<StoredToken>> {
        let Some(raw) = self.store.get(&token_key(self.provider)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(err) => {
                warn!(provider = %self.provider, error = %err, "discarding unreadable stored token");
                self.store.remove(&token_key(self.provider)).await?;
                Ok(None)
            }
        }
    }

    /// Take over the token of a fresh session and persist it
    async fn adopt(&self, response: AuthResponse) -> Result<AuthData> {
        let stored = StoredToken {
            token: response.token.clone(),
            saved_at: Utc::now(),
        };
        self.client.set_token(Some(response.token.clone()));
        self.store
            .set(&token_key(self.provider), &serde_json::to_string(&stored)?)
            .await?;
        Ok(response.auth_data(self.provider))
    }

    async fn forget(&self) -> Result<()> {
        self.client.set_token(None);
        self.store.remove(&token_key(self.provider)).await
    }
}

#[async_trait]
impl WAuthBackend for HttpWAuthBackend {
    fn provider(&self) -> WAuthProvider {
        self.provider
    }

    async fn restore_session(&self) -> Result<Option<AuthData>> {
        let Some(stored) = self.load_token().await? else {
            debug!(provider = %self.provider, "no stored wauth token");
            return Ok(None);
        };

        self.client.set_token(Some(stored.token));
        match self.client.auth_refresh().await {
            Ok(response) => Ok(Some(self.adopt(response).await?)),
            Err(err) if err.is_auth_error() => {
                info!(provider = %self.provider, saved_at = %stored.saved_at, "stored wauth token rejected");
                self.forget().await?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn authenticate(&self) -> Result<AuthData> {
        let code = self.authorizer.authorize(self.provider).await?;
        let response = self.client.auth_with_oauth2(self.provider, &code).await?;
        info!(provider = %self.provider, user = %response.record.id, "wauth login complete");
        self.adopt(response).await
    }

    async fn logout(&self) -> Result<()> {
        self.forget().await
    }

    async fn wallet(&self) -> Result<Option<WAuthWallet>> {
        self.client.get_wallet().await
    }

    async fn sign(
        &self,
        transaction: Transaction,
        options: Option<SignatureOptions>,
    ) -> Result<Transaction> {
        self.client
            .sign_transaction(&transaction, options.as_ref())
            .await
    }

    async fn sign_data_item(&self, item: DataItemRequest) -> Result<SignedDataItem> {
        self.client.sign_data_item(&item).await
    }

    async fn signature(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.client.signature(data).await
    }

    async fn connected_wallets(&self) -> Result<Vec<ConnectedWallet>> {
        self.client.list_connected_wallets().await
    }

    async fn add_connected_wallet(
        &self,
        address: &str,
        public_key: &str,
        strategy: Option<&str>,
    ) -> Result<ConnectedWallet> {
        self.client
            .create_connected_wallet(address, public_key, strategy)
            .await
    }

    async fn remove_connected_wallet(&self, wallet_id: &str) -> Result<()> {
        self.client.delete_connected_wallet(wallet_id).await
    }
}
