/*
[INPUT]:  Strategy registry and an injected key-value store
[OUTPUT]: WalletManager, connection snapshots, observers and the session cache
[POS]:    Session layer - connection lifecycle around the active strategy
[UPDATE]: When adding session components or changing exports
*/

pub mod cache;
pub mod manager;
pub mod observer;
pub mod state;
pub mod store;

pub use cache::{ADDRESS_KEY, CacheRecord, STRATEGY_KEY, SessionCache};
pub use manager::{DEFAULT_RECONNECT_GRACE, ManagerConfig, WalletManager};
pub use observer::{ObserverList, StateCallback, Subscription};
pub use state::ConnectionState;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
