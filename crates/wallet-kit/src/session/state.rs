/*
[INPUT]:  Manager transitions (select, connect, disconnect, address switches)
[OUTPUT]: Immutable connection snapshot handed to observers
[POS]:    Session layer - connection state value type
[UPDATE]: When the state shape or its invariants change
*/

use std::collections::BTreeSet;

use crate::strategy::StrategyHandle;
use crate::types::ConnectionPhase;

/// Snapshot of the manager's connection
///
/// Replaced wholesale on every transition. `connected` implies `address` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionState {
    pub connected: bool,
    pub address: Option<String>,
    pub public_key: Option<String>,
    pub permissions: BTreeSet<String>,
    pub strategy: Option<StrategyHandle>,
}

impl ConnectionState {
    /// Not connected, optionally with a selected strategy
    pub fn disconnected(strategy: Option<StrategyHandle>) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn connected(
        strategy: StrategyHandle,
        address: String,
        public_key: String,
        permissions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            connected: true,
            address: Some(address),
            public_key: Some(public_key),
            permissions: permissions.into_iter().collect(),
            strategy: Some(strategy),
        }
    }

    /// Same session, different active strategy reference
    pub fn with_strategy(&self, strategy: StrategyHandle) -> Self {
        Self {
            strategy: Some(strategy),
            ..self.clone()
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        match (&self.strategy, self.connected) {
            (None, _) => ConnectionPhase::NoStrategy,
            (Some(_), false) => ConnectionPhase::StrategySelected,
            (Some(_), true) => ConnectionPhase::Connected,
        }
    }

    pub fn strategy_id(&self) -> Option<&str> {
        self.strategy.as_ref().map(StrategyHandle::id)
    }

    /// False for the connected-without-address anomaly
    pub fn is_consistent(&self) -> bool {
        !self.connected || self.address.as_deref().is_some_and(|a| !a.is_empty())
    }
}
