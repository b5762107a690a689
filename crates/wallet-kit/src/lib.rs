/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public wallet-kit crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod http;
pub mod session;
pub mod strategy;
pub mod types;

// Re-export commonly used types from http
pub use http::{ClientConfig, HttpWAuthBackend, Result, WAuthClient, WalletError};

// Re-export commonly used types from session
pub use session::{
    ConnectionState, JsonFileStore, KeyValueStore, ManagerConfig, MemoryStore, SessionCache,
    Subscription, WalletManager,
};

// Re-export commonly used types from strategy
pub use strategy::{
    EthereumBridgeStrategy, EthereumProvider, InjectedWallet, LocalEthereumProvider,
    MockInjectedWallet, MockStrategy, MockWAuthBackend, NativeExtensionStrategy,
    OAuthAuthorizer, OAuthStrategyFactory, RawSigner, SignerFn, Strategy, StrategyHandle,
    StrategyRegistry, WAuthBackend, WAuthStrategy, normalize_signer,
};

// Re-export all types
pub use types::*;
