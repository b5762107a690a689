/*
[INPUT]:  KitConfig
[OUTPUT]: WalletManager wired with the file store and every configured strategy
[POS]:    CLI layer - composition root
[UPDATE]: When adding strategies or changing how backends are built
*/

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use wallet_kit::{
    ClientConfig, EthereumBridgeStrategy, EthereumProvider, HttpWAuthBackend, InjectedWallet,
    JsonFileStore, KeyValueStore, LocalEthereumProvider, MockInjectedWallet,
    NativeExtensionStrategy, OAuthAuthorizer, OAuthStrategyFactory, Strategy, StrategyRegistry,
    WAuthClient, WAuthProvider, WAuthStrategy, WalletManager,
};

use crate::authorizer::TerminalAuthorizer;
use crate::config::KitConfig;

/// Build the manager described by `config`
pub fn build_manager(config: &KitConfig) -> Result<WalletManager> {
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&config.cache_path));
    let client = WAuthClient::with_config(ClientConfig {
        base_url: config.wauth.base_url.clone(),
        ..ClientConfig::default()
    })
    .context("create WAuth client")?;
    let authorizer: Arc<dyn OAuthAuthorizer> = Arc::new(TerminalAuthorizer::new(
        client.clone(),
        config.wauth.redirect_url.clone(),
    ));

    let extension = config.demo_extension.as_ref().map(|demo| {
        let wallet: Arc<dyn InjectedWallet> =
            Arc::new(MockInjectedWallet::new(&demo.address, &demo.public_key));
        wallet
    });
    let mut registry = StrategyRegistry::new()
        .register(Arc::new(NativeExtensionStrategy::new(
            extension,
            config.app.clone(),
            config.gateway.clone(),
        )))
        .with_oauth_factory(oauth_factory(client, authorizer, store.clone()));

    if let Some(key) = &config.eth_private_key {
        let provider: Arc<dyn EthereumProvider> =
            Arc::new(LocalEthereumProvider::new(key).context("load eth_private_key")?);
        registry = registry.register(Arc::new(EthereumBridgeStrategy::new(Some(provider))));
    }

    info!(
        cache = %config.cache_path.display(),
        wauth = %config.wauth.base_url,
        "wallet manager ready"
    );
    Ok(WalletManager::new(registry, store, config.manager_config()))
}

/// OAuth strategies share one HTTP client configuration; each provider keeps its own token
fn oauth_factory(
    client: WAuthClient,
    authorizer: Arc<dyn OAuthAuthorizer>,
    store: Arc<dyn KeyValueStore>,
) -> OAuthStrategyFactory {
    Arc::new(move |provider: WAuthProvider| {
        let client = client.detached();
        let backend = HttpWAuthBackend::new(provider, client, authorizer.clone(), store.clone());
        let strategy: Arc<dyn Strategy> = WAuthStrategy::new(Arc::new(backend));
        strategy
    })
}
