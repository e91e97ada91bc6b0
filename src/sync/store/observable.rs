//! Publish/subscribe with synchronous replay on subscribe.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::error;

/// Snapshot listener. Receives a shared, immutable snapshot.
pub type Listener<S> = Arc<dyn Fn(Arc<S>) + Send + Sync>;

/// A store that hands out snapshots to subscribers.
pub trait Observable {
    /// Snapshot type delivered to listeners.
    type Snapshot: Send + Sync + 'static;

    /// Register `listener`.
    ///
    /// The listener is invoked once, synchronously, with the current snapshot
    /// before this returns, and again after every mutating operation. A new
    /// subscriber therefore never misses the current state.
    fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Arc<Self::Snapshot>) + Send + Sync + 'static;
}

trait Deregister: Send + Sync {
    fn deregister(&self, id: u64) -> bool;
}

impl<S: 'static> Deregister for DashMap<u64, Listener<S>> {
    fn deregister(&self, id: u64) -> bool {
        self.remove(&id).is_some()
    }
}

/// Handle returned by `subscribe`.
#[must_use = "dropping the handle keeps the listener registered; call `unsubscribe` to remove it"]
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Deregister>,
}

impl Subscription {
    /// Remove the listener. Returns whether it was still registered.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.deregister(self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Listener registry shared by the stores.
pub struct ListenerRegistry<S> {
    listeners: Arc<DashMap<u64, Listener<S>>>,
    next_id: AtomicU64,
}

impl<S: Send + Sync + 'static> ListenerRegistry<S> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener and replay `current` to it.
    pub fn register(&self, listener: Listener<S>, current: Arc<S>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let replay = Arc::clone(&listener);
        self.listeners.insert(id, listener);
        invoke(id, &replay, current);

        let registry: Arc<dyn Deregister> = self.listeners.clone();
        Subscription {
            id,
            registry: Arc::downgrade(&registry),
        }
    }

    /// Deliver `snapshot` to every listener.
    ///
    /// Listeners are collected first so none runs while the registry is
    /// borrowed; a listener may subscribe or unsubscribe from its callback.
    pub fn publish(&self, snapshot: &Arc<S>) {
        let listeners: Vec<(u64, Listener<S>)> = self
            .listeners
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        for (id, listener) in listeners {
            invoke(id, &listener, Arc::clone(snapshot));
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<S: Send + Sync + 'static> Default for ListenerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke<S>(id: u64, listener: &Listener<S>, snapshot: Arc<S>) {
    if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
        error!(listener_id = id, "Listener panicked; remaining listeners still notified");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_register_replays_current() {
        let registry = ListenerRegistry::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = registry.register(
            Arc::new(move |value: Arc<u32>| sink.lock().unwrap().push(*value)),
            Arc::new(7),
        );
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let registry = ListenerRegistry::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = registry.register(
            Arc::new(move |value: Arc<u32>| sink.lock().unwrap().push(*value)),
            Arc::new(1),
        );
        registry.publish(&Arc::new(2));
        assert!(sub.unsubscribe());
        registry.publish(&Arc::new(3));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let registry = ListenerRegistry::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _bad = registry.register(
            Arc::new(|value: Arc<u32>| {
                assert!(*value < 5, "listener blew up");
            }),
            Arc::new(0),
        );
        let sink = Arc::clone(&seen);
        let _good = registry.register(
            Arc::new(move |value: Arc<u32>| sink.lock().unwrap().push(*value)),
            Arc::new(0),
        );

        registry.publish(&Arc::new(9));
        assert_eq!(*seen.lock().unwrap(), vec![0, 9]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = ListenerRegistry::<u32>::new();
        let sub = registry.register(Arc::new(|_: Arc<u32>| {}), Arc::new(0));
        drop(registry);
        assert!(!sub.unsubscribe());
    }
}
