/*
[INPUT]:  Wallet backends (browser extension, Ethereum provider, WAuth OAuth)
[OUTPUT]: Strategy trait, concrete strategies, registry and signer normalization
[POS]:    Strategy layer - everything the manager dispatches to
[UPDATE]: When adding a backend kind or changing the strategy contract
*/

pub mod contract;
pub mod ethereum;
pub mod mock;
pub mod native;
pub mod registry;
pub mod signer;
pub mod wauth;

pub use contract::{Strategy, StrategyHandle};
pub use ethereum::{
    ETHEREUM_STRATEGY_ID, EthereumBridgeStrategy, EthereumProvider, LocalEthereumProvider,
};
pub use mock::MockStrategy;
pub use native::{InjectedWallet, MockInjectedWallet, NATIVE_STRATEGY_ID, NativeExtensionStrategy};
pub use registry::{OAuthStrategyFactory, StrategyRegistry};
pub use signer::{RawSigner, SignerFn, SignerFuture, normalize_signer};
pub use wauth::{
    AuthorizationCode, MockWAuthBackend, OAuthAuthorizer, WAUTH_PREFIX, WAuthBackend,
    WAuthStrategy, WAuthWallet, metadata_for, wauth_strategy_id,
};
