/*
[INPUT]:  Eager strategy instances + a factory for OAuth providers
[OUTPUT]: Id -> StrategyHandle resolution with once-per-provider lazy creation
[POS]:    Strategy layer - registry owned by the manager
[UPDATE]: When id namespacing or instantiation rules change
*/

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::types::{StrategyMetadata, WAuthProvider};

use super::contract::{Strategy, StrategyHandle};
use super::wauth::{metadata_for, provider_from_id};

/// Creates the OAuth strategy for a provider on first reference
pub type OAuthStrategyFactory = Arc<dyn Fn(WAuthProvider) -> Arc<dyn Strategy> + Send + Sync>;

/// Strategy lookup by id
///
/// Non-OAuth strategies are registered up front. `wauth-<provider>` ids are
/// resolved through the factory once; later lookups return the same instance.
pub struct StrategyRegistry {
    eager: Vec<StrategyHandle>,
    oauth_factory: Option<OAuthStrategyFactory>,
    oauth: Mutex<HashMap<WAuthProvider, StrategyHandle>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            eager: Vec::new(),
            oauth_factory: None,
            oauth: Mutex::new(HashMap::new()),
        }
    }

    /// Register an eagerly created strategy; a later registration with the same id replaces it
    pub fn register(mut self, strategy: Arc<dyn Strategy>) -> Self {
        let handle = StrategyHandle::new(strategy);
        self.eager.retain(|existing| existing.id() != handle.id());
        self.eager.push(handle);
        self
    }

    pub fn with_oauth_factory(mut self, factory: OAuthStrategyFactory) -> Self {
        self.oauth_factory = Some(factory);
        self
    }

    /// Resolve an id, creating the OAuth strategy on first use
    pub fn get(&self, id: &str) -> Option<StrategyHandle> {
        if let Some(handle) = self.eager.iter().find(|handle| handle.id() == id) {
            return Some(handle.clone());
        }

        let provider = provider_from_id(id)?;
        let factory = self.oauth_factory.as_ref()?;

        let mut oauth = self.oauth.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = oauth.entry(provider).or_insert_with(|| {
            debug!(strategy = %id, "instantiating oauth strategy");
            StrategyHandle::new(factory(provider))
        });
        Some(handle.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.eager.iter().any(|handle| handle.id() == id)
            || (self.oauth_factory.is_some() && provider_from_id(id).is_some())
    }

    /// Metadata for every strategy a caller can select, without instantiating OAuth ones
    pub fn list(&self) -> Vec<StrategyMetadata> {
        let mut all: Vec<StrategyMetadata> = self
            .eager
            .iter()
            .map(|handle| handle.strategy().metadata().clone())
            .collect();

        if self.oauth_factory.is_some() {
            all.extend(WAuthProvider::ALL.into_iter().map(metadata_for));
        }
        all
    }

    /// Number of OAuth strategies created so far
    pub fn instantiated_oauth(&self) -> usize {
        self.oauth
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("eager", &self.eager)
            .field("oauth_instantiated", &self.instantiated_oauth())
            .finish()
    }
}
