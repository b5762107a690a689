/*
[INPUT]:  Callbacks registered by UI bindings or other consumers
[OUTPUT]: Ordered, synchronous fan-out of connection snapshots
[POS]:    Session layer - observer registry
[UPDATE]: When delivery ordering or unsubscribe semantics change
*/

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::state::ConnectionState;

/// Observer callback; receives every new snapshot
pub type StateCallback = Arc<dyn Fn(&ConnectionState) + Send + Sync>;

struct Entry {
    id: u64,
    callback: StateCallback,
    active: Arc<AtomicBool>,
}

#[derive(Default)]
struct Observers {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry>>,
}

impl Observers {
    fn remove(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|entry| entry.id != id);
    }
}

/// Subscribers in insertion order
///
/// Delivery iterates over a snapshot taken without holding the lock during
/// callbacks, and skips entries unsubscribed mid-round.
#[derive(Clone, Default)]
pub struct ObserverList {
    inner: Arc<Observers>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: StateCallback) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));

        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Entry {
                id,
                callback,
                active: active.clone(),
            });

        Subscription {
            id,
            active,
            list: Arc::downgrade(&self.inner),
        }
    }

    pub fn notify(&self, state: &ConnectionState) {
        let round: Vec<(StateCallback, Arc<AtomicBool>)> = self
            .inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| (entry.callback.clone(), entry.active.clone()))
            .collect();

        for (callback, active) in round {
            if active.load(Ordering::Acquire) {
                callback(state);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let drained: Vec<Entry> = self
            .inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for entry in drained {
            entry.active.store(false, Ordering::Release);
        }
    }
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.len())
            .finish()
    }
}

/// Handle returned by `subscribe`
///
/// Dropping it keeps the observer registered; call [`Subscription::unsubscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    list: Weak<Observers>,
}

impl Subscription {
    /// Stop delivery; safe to call repeatedly and from inside a callback
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(list) = self.list.upgrade() {
            list.remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
