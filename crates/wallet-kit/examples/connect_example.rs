/*
[INPUT]:  An in-memory extension wallet and session store
[OUTPUT]: Console walkthrough of connect, account switch, reconnect and disconnect
[POS]:    Examples - connection lifecycle demonstration
[UPDATE]: When the manager lifecycle changes
*/

use std::sync::Arc;
use std::time::Duration;

use wallet_kit::*;

/// Example: connection lifecycle
///
/// 1. Register the native strategy over a mock extension
/// 2. Connect and observe the state change
/// 3. Switch accounts in the "extension"
/// 4. Restore the session from the cache in a second manager
/// 5. Disconnect
#[tokio::main]
async fn main() {
    println!("=== wallet-kit Connection Example ===\n");

    let wallet = Arc::new(MockInjectedWallet::new("addr-one", "pk-one"));
    let store = Arc::new(MemoryStore::new());
    let registry = || {
        let injected: Arc<dyn InjectedWallet> = wallet.clone();
        StrategyRegistry::new().register(Arc::new(NativeExtensionStrategy::new(
            Some(injected),
            AppInfo {
                name: "Example dApp".to_string(),
                logo: None,
            },
            GatewayConfig::default(),
        )))
    };

    let manager = WalletManager::new(registry(), store.clone(), ManagerConfig::default());
    let _subscription = manager.subscribe(|state| {
        println!(
            "  -> connected={} address={}",
            state.connected,
            state.address.as_deref().unwrap_or("-")
        );
    });

    if let Err(e) = manager.set_strategy("wander") {
        eprintln!("Failed to select strategy: {}", e);
        return;
    }
    if let Err(e) = manager.connect(None).await {
        eprintln!("Failed to connect: {}", e);
        return;
    }
    println!("✓ Connected");

    wallet.switch_address(Some("addr-two"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("✓ Account switch observed");

    // A fresh manager over the same store picks the session back up
    let restored = WalletManager::new(registry(), store, ManagerConfig::default());
    if restored.auto_reconnect().await {
        println!(
            "✓ Restored session for {}",
            restored.state().address.unwrap_or_default()
        );
    }

    if let Err(e) = manager.disconnect().await {
        eprintln!("Failed to disconnect: {}", e);
        return;
    }
    println!("\n✓ Connection example complete");
}
