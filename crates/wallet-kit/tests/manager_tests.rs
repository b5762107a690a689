/*
[INPUT]:  Registries of scripted strategies and in-memory stores
[OUTPUT]: Test results for the connection-state manager
[POS]:    Integration tests - manager lifecycle, cache, reconnect and observers
[UPDATE]: When manager transitions or reconnect policy change
*/

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{ReadOnlyStore, StateLog, manager, memory_store, oauth_factory};
use wallet_kit::session::{ADDRESS_KEY, STRATEGY_KEY};
use wallet_kit::{
    AppInfo, Capability, ConnectionPhase, DataItemRequest, EncryptionOptions,
    EthereumBridgeStrategy, GatewayConfig, KeyValueStore, LocalEthereumProvider,
    MockInjectedWallet, MockStrategy, MockWAuthBackend, NativeExtensionStrategy, RawSigner,
    StrategyKind, StrategyRegistry, WAuthProvider, WalletError, normalize_signer,
};
use tokio_test::assert_ok;

const TEST_EVM_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

fn single(strategy: &Arc<MockStrategy>) -> StrategyRegistry {
    StrategyRegistry::new().register(strategy.clone())
}

#[tokio::test]
async fn test_connect_commits_state_and_cache() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let store = memory_store();
    let manager = manager(single(&strategy), store.clone());
    let log = StateLog::attach(&manager);

    assert!(manager.select_strategy("alpha"));
    assert_ok!(manager.connect(Some(&["ACCESS_ADDRESS".to_string()])).await);

    let state = manager.state();
    assert_eq!(state.phase(), ConnectionPhase::Connected);
    assert_eq!(state.address.as_deref(), Some("alpha-address"));
    assert_eq!(state.public_key.as_deref(), Some("alpha-public-key"));
    assert!(state.permissions.contains("ACCESS_ADDRESS"));
    assert_eq!(log.len(), 2); // select + connect

    assert_eq!(store.len().await, 2);
    assert_eq!(store.get(STRATEGY_KEY).await.unwrap().as_deref(), Some("alpha"));
    assert_eq!(
        store.get(ADDRESS_KEY).await.unwrap().as_deref(),
        Some("alpha-address")
    );
}

#[tokio::test]
async fn test_disconnect_clears_state_and_cache() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let store = memory_store();
    let manager = manager(single(&strategy), store.clone());

    manager.set_strategy("alpha").unwrap();
    manager.connect(None).await.unwrap();
    assert_ok!(manager.disconnect().await);

    assert_eq!(manager.state().phase(), ConnectionPhase::NoStrategy);
    assert!(store.is_empty().await);
    assert!(!strategy.is_connected());
}

#[tokio::test]
async fn test_disconnect_resets_even_when_backend_fails() {
    let strategy = Arc::new(MockStrategy::new("alpha").failing_on("disconnect"));
    let store = memory_store();
    let manager = manager(single(&strategy), store.clone());

    manager.set_strategy("alpha").unwrap();
    manager.connect(None).await.unwrap();

    let err = manager.disconnect().await.unwrap_err();
    assert!(matches!(err, WalletError::Backend { .. }));
    assert_eq!(manager.state().phase(), ConnectionPhase::NoStrategy);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_disconnect_without_strategy_is_noop() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let manager = manager(single(&strategy), memory_store());
    let log = StateLog::attach(&manager);

    assert_ok!(manager.disconnect().await);
    assert_eq!(strategy.total_calls(), 0);
    assert_eq!(log.len(), 0);
}

#[tokio::test]
async fn test_connect_failure_keeps_prior_state() {
    let strategy = Arc::new(MockStrategy::new("alpha").failing_on("get_active_public_key"));
    let store = memory_store();
    let manager = manager(single(&strategy), store.clone());

    manager.set_strategy("alpha").unwrap();
    let before = manager.state();

    let err = manager.connect(None).await.unwrap_err();
    match err {
        WalletError::Backend { strategy, message } => {
            assert_eq!(strategy, "alpha");
            assert!(message.contains("get_active_public_key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(manager.state(), before);
    assert_eq!(manager.state().phase(), ConnectionPhase::StrategySelected);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_connected_never_without_address() {
    let strategy = Arc::new(MockStrategy::new("alpha").with_address(None));
    let manager = manager(single(&strategy), memory_store());
    let seen = StateLog::attach(&manager);

    manager.set_strategy("alpha").unwrap();
    assert!(manager.connect(None).await.is_err());

    assert!(manager.state().is_consistent());
    assert!(seen.last().is_some_and(|state| state.is_consistent()));
    assert_eq!(strategy.calls("disconnect"), 1);
}

#[tokio::test]
async fn test_wallet_dropping_address_forces_disconnect() {
    let strategy = Arc::new(
        MockStrategy::new("alpha").with_capabilities(&[Capability::AddressEvents]),
    );
    let store = memory_store();
    let manager = manager(single(&strategy), store.clone());
    manager.set_strategy("alpha").unwrap();
    manager.connect(None).await.unwrap();

    let mut states = manager.watch();
    strategy.emit_address(None);

    let disconnected = tokio::time::timeout(
        Duration::from_secs(2),
        states.wait_for(|state| !state.connected),
    )
    .await;
    assert!(disconnected.is_ok());
    assert_eq!(manager.state().phase(), ConnectionPhase::NoStrategy);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_wallet_switch_updates_address_and_cache() {
    let strategy = Arc::new(
        MockStrategy::new("alpha").with_capabilities(&[Capability::AddressEvents]),
    );
    let store = memory_store();
    let manager = manager(single(&strategy), store.clone());
    manager.set_strategy("alpha").unwrap();
    manager.connect(None).await.unwrap();

    let mut states = manager.watch();
    strategy.emit_address(Some("second-address"));

    let switched = tokio::time::timeout(
        Duration::from_secs(2),
        states.wait_for(|state| state.address.as_deref() == Some("second-address")),
    )
    .await;
    assert!(switched.is_ok());
    assert!(manager.state().connected);
    assert_eq!(
        store.get(ADDRESS_KEY).await.unwrap().as_deref(),
        Some("second-address")
    );
}

#[tokio::test]
async fn test_select_same_strategy_is_noop() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let manager = manager(single(&strategy), memory_store());
    let log = StateLog::attach(&manager);

    assert!(manager.select_strategy("alpha"));
    let first = manager.active_strategy().unwrap();
    assert!(manager.select_strategy("alpha"));
    let second = manager.active_strategy().unwrap();

    assert!(first.same_instance(&second));
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn test_select_unknown_reports_false() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let manager = manager(single(&strategy), memory_store());

    assert!(!manager.select_strategy("beta"));
    assert!(manager.active_strategy().is_none());
    assert!(matches!(
        manager.set_strategy("beta"),
        Err(WalletError::UnknownStrategy(id)) if id == "beta"
    ));
}

#[tokio::test]
async fn test_switching_strategy_keeps_session() {
    let alpha = Arc::new(MockStrategy::new("alpha"));
    let beta = Arc::new(MockStrategy::new("beta"));
    let registry = StrategyRegistry::new()
        .register(alpha.clone())
        .register(beta.clone());
    let manager = manager(registry, memory_store());

    manager.set_strategy("alpha").unwrap();
    manager.connect(None).await.unwrap();
    manager.set_strategy("beta").unwrap();

    let state = manager.state();
    assert!(state.connected);
    assert_eq!(state.address.as_deref(), Some("alpha-address"));
    assert_eq!(state.strategy_id(), Some("beta"));
}

#[tokio::test]
async fn test_previous_strategy_events_ignored_after_switch() {
    let alpha = Arc::new(
        MockStrategy::new("alpha").with_capabilities(&[Capability::AddressEvents]),
    );
    let beta = Arc::new(MockStrategy::new("beta"));
    let registry = StrategyRegistry::new()
        .register(alpha.clone())
        .register(beta.clone());
    let store = memory_store();
    let manager = manager(registry, store.clone());

    manager.set_strategy("alpha").unwrap();
    manager.connect(None).await.unwrap();
    manager.set_strategy("beta").unwrap();

    alpha.emit_address(Some("alpha-2"));
    alpha.emit_address(None);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = manager.state();
    assert!(state.connected);
    assert_eq!(state.strategy_id(), Some("beta"));
    assert_eq!(state.address.as_deref(), Some("alpha-address"));
    assert_eq!(state.public_key.as_deref(), Some("alpha-public-key"));
    assert_eq!(
        store.get(ADDRESS_KEY).await.unwrap().as_deref(),
        Some("alpha-address")
    );
    assert_eq!(alpha.calls("disconnect"), 0);
}

#[tokio::test]
async fn test_oauth_lookup_is_idempotent() {
    let registry = StrategyRegistry::new().with_oauth_factory(oauth_factory(Vec::new()));
    let manager = manager(registry, memory_store());

    assert!(manager.select_strategy("wauth-google"));
    let first = manager.active_strategy().unwrap();
    manager.set_strategy("wauth-github").unwrap();
    manager.set_strategy("wauth-google").unwrap();
    let again = manager.active_strategy().unwrap();

    assert!(first.same_instance(&again));
    assert_eq!(manager.registry().instantiated_oauth(), 2);
    assert_eq!(first.kind(), StrategyKind::OAuthProvider(WAuthProvider::Google));
}

#[tokio::test]
async fn test_auto_reconnect_without_cache_makes_no_calls() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let manager = manager(single(&strategy), memory_store());
    let log = StateLog::attach(&manager);

    assert!(!manager.auto_reconnect().await);
    assert_eq!(strategy.total_calls(), 0);
    assert_eq!(log.len(), 0);
}

#[tokio::test]
async fn test_auto_reconnect_with_partial_cache_makes_no_calls() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let store = memory_store();
    store.set(STRATEGY_KEY, "alpha").await.unwrap();
    let manager = manager(single(&strategy), store);

    assert!(!manager.auto_reconnect().await);
    assert_eq!(strategy.total_calls(), 0);
    assert!(manager.active_strategy().is_none());
}

#[tokio::test]
async fn test_auto_reconnect_restores_oauth_session() {
    let backend = Arc::new(
        MockWAuthBackend::new(WAuthProvider::Google, "oauth-address", "oauth-key")
            .with_persisted_session(),
    );
    let registry = StrategyRegistry::new().with_oauth_factory(oauth_factory(vec![backend.clone()]));
    let store = memory_store();
    store.set(STRATEGY_KEY, "wauth-google").await.unwrap();
    store.set(ADDRESS_KEY, "oauth-address").await.unwrap();
    let manager = manager(registry, store);

    assert!(manager.auto_reconnect().await);

    let state = manager.state();
    assert!(state.connected);
    assert_eq!(state.address.as_deref(), Some("oauth-address"));
    assert_eq!(state.public_key.as_deref(), Some("oauth-key"));
    assert!(!state.permissions.is_empty());
    assert_eq!(backend.calls("authenticate"), 0);
    assert_eq!(
        manager.get_email().await.as_deref(),
        Some("tester@google.example")
    );
}

#[tokio::test]
async fn test_auto_reconnect_oauth_without_session_is_false() {
    let registry = StrategyRegistry::new().with_oauth_factory(oauth_factory(Vec::new()));
    let store = memory_store();
    store.set(STRATEGY_KEY, "wauth-discord").await.unwrap();
    store.set(ADDRESS_KEY, "old-address").await.unwrap();
    let manager = manager(registry, store);

    assert!(!manager.auto_reconnect().await);
    assert!(!manager.state().connected);
    assert_eq!(manager.state().strategy_id(), Some("wauth-discord"));
}

#[tokio::test]
async fn test_auto_reconnect_prefers_strategy_reconnect() {
    let strategy = Arc::new(MockStrategy::new("alpha").with_capabilities(&[Capability::Reconnect]));
    let store = memory_store();
    store.set(STRATEGY_KEY, "alpha").await.unwrap();
    store.set(ADDRESS_KEY, "alpha-address").await.unwrap();
    let manager = manager(single(&strategy), store);

    assert!(manager.auto_reconnect().await);
    assert_eq!(strategy.calls("reconnect"), 1);
    assert_eq!(strategy.calls("connect"), 0);
    assert!(manager.state().connected);
}

#[tokio::test]
async fn test_auto_reconnect_falls_back_to_connect() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let store = memory_store();
    store.set(STRATEGY_KEY, "alpha").await.unwrap();
    store.set(ADDRESS_KEY, "alpha-address").await.unwrap();
    let manager = manager(single(&strategy), store);

    assert!(manager.auto_reconnect().await);
    assert_eq!(strategy.calls("connect"), 1);
}

#[tokio::test]
async fn test_auto_reconnect_swallows_backend_failure() {
    let strategy = Arc::new(MockStrategy::new("alpha").failing_on("connect"));
    let store = memory_store();
    store.set(STRATEGY_KEY, "alpha").await.unwrap();
    store.set(ADDRESS_KEY, "alpha-address").await.unwrap();
    let manager = manager(single(&strategy), store);

    assert!(!manager.auto_reconnect().await);
    assert!(!manager.state().connected);
}

#[tokio::test]
async fn test_auto_reconnect_clears_stale_strategy() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let store = memory_store();
    store.set(STRATEGY_KEY, "retired").await.unwrap();
    store.set(ADDRESS_KEY, "addr").await.unwrap();
    let manager = manager(single(&strategy), store.clone());

    assert!(!manager.auto_reconnect().await);
    assert!(store.is_empty().await);
    assert_eq!(strategy.total_calls(), 0);
}

#[tokio::test]
async fn test_cache_write_failure_does_not_fail_connect() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let manager = manager(single(&strategy), Arc::new(ReadOnlyStore::default()));

    manager.set_strategy("alpha").unwrap();
    assert_ok!(manager.connect(None).await);
    assert!(manager.state().connected);
}

#[tokio::test]
async fn test_missing_capability_leaves_state_unchanged() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let manager = manager(single(&strategy), memory_store());
    manager.set_strategy("alpha").unwrap();
    manager.connect(None).await.unwrap();
    let before = manager.state();

    let err = manager
        .sign_data_item(DataItemRequest::new(b"payload".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalletError::CapabilityUnsupported {
            capability: Capability::SignDataItem,
            ..
        }
    ));
    assert_eq!(manager.state(), before);
    assert_eq!(strategy.calls("sign_data_item"), 0);
}

#[tokio::test]
async fn test_passthrough_without_strategy() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let manager = manager(single(&strategy), memory_store());

    let err = manager
        .sign(Default::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::NoStrategySelected));
    assert_eq!(manager.get_email().await, None);
    assert!(manager.get_raw_signer().is_absent());
}

#[tokio::test]
async fn test_observers_notified_in_order_with_mid_round_unsubscribe() {
    let strategy = Arc::new(MockStrategy::new("alpha"));
    let manager = manager(single(&strategy), memory_store());
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let log_a = order.clone();
    manager.subscribe(move |_| log_a.lock().unwrap().push("A"));
    let log_b = order.clone();
    let b = manager.subscribe(move |_| log_b.lock().unwrap().push("B"));

    let log_c = order.clone();
    let b_in_c = b.clone();
    manager.subscribe(move |_| {
        log_c.lock().unwrap().push("C");
        b_in_c.unsubscribe();
    });

    manager.set_strategy("alpha").unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);

    manager.connect(None).await.unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C", "A", "C"]);

    b.unsubscribe();
}

#[tokio::test]
async fn test_connect_and_disconnect_are_serialized() {
    let strategy = Arc::new(
        MockStrategy::new("alpha").with_connect_delay(Duration::from_millis(20)),
    );
    let manager = manager(single(&strategy), memory_store());
    manager.set_strategy("alpha").unwrap();

    let (first, second) = tokio::join!(manager.connect(None), manager.disconnect());
    assert_ok!(first);
    assert_ok!(second);

    // connect finished before disconnect started
    assert_eq!(strategy.calls("connect"), 1);
    assert_eq!(strategy.calls("disconnect"), 1);
    assert_eq!(manager.state().phase(), ConnectionPhase::NoStrategy);
}

#[tokio::test]
async fn test_native_extension_end_to_end() {
    let wallet = Arc::new(MockInjectedWallet::new("native-address", "native-key"));
    let native = NativeExtensionStrategy::new(
        Some(wallet.clone()),
        AppInfo {
            name: "tests".to_string(),
            logo: None,
        },
        GatewayConfig::default(),
    );
    let registry = StrategyRegistry::new().register(Arc::new(native));
    let manager = manager(registry, memory_store());

    manager.set_strategy("wander").unwrap();
    manager.connect(None).await.unwrap();

    let RawSigner::Object(_) = manager.get_raw_signer() else {
        panic!("native extension must expose its wallet object");
    };
    let signer = normalize_signer(manager.get_raw_signer()).unwrap();
    let signed = signer(DataItemRequest::new(b"native".to_vec())).await.unwrap();
    assert_eq!(signed.raw, b"native".to_vec());

    let encrypted = manager
        .encrypt(b"abc", &EncryptionOptions::default())
        .await
        .unwrap();
    assert_eq!(encrypted, b"cba".to_vec());
    assert_eq!(wallet.calls("connect"), 1);
}

#[tokio::test]
async fn test_ethereum_bridge_end_to_end() {
    let provider = LocalEthereumProvider::new(TEST_EVM_KEY).unwrap();
    let bridge = EthereumBridgeStrategy::new(Some(Arc::new(provider)));
    let registry = StrategyRegistry::new().register(Arc::new(bridge));
    let manager = manager(registry, memory_store());

    manager.set_strategy("ethereum").unwrap();
    manager.connect(None).await.unwrap();
    assert!(manager.state().connected);

    let RawSigner::Function(_) = manager.get_raw_signer() else {
        panic!("ethereum bridge must expose a signer function");
    };
    assert_ok!(
        manager
            .sign_data_item(DataItemRequest::new(b"bridged".to_vec()))
            .await
    );

    let err = manager
        .encrypt(b"abc", &EncryptionOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_capability_error());
}
