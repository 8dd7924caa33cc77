//! Listener Registry
//!
//! Maps identifier to the set of weakly-held listeners interested in it, and
//! drives the bridge subscription for each identifier:
//!
//! - first listener added: `subscribe` runs before the listener is inserted
//! - last listener removed (or found dead): the entry is removed, then
//!   `unsubscribe` runs
//!
//! One mutex guards every mutation and every dispatch snapshot. Listener
//! callbacks never run under it.

pub mod listener;

use std::collections::HashMap;
use std::sync::Arc;
use log::{debug, trace, warn};
use parking_lot::Mutex;

pub use listener::{address_of, listener_fn, ErasedListener, FnListener, ListenerHandle, ObjectListener};

use crate::bridge::NotificationBridge;

/// Thread-safe identifier to listener-set registry
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<String, Vec<ListenerHandle>>>,
    bridge: Arc<dyn NotificationBridge>,
}

impl ListenerRegistry {
    pub fn new(bridge: Arc<dyn NotificationBridge>) -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            bridge,
        }
    }

    /// Register a listener for an identifier. Returns false when the listener
    /// was already registered for it.
    pub fn add_listener<L: ObjectListener>(&self, identifier: &str, listener: &Arc<L>) -> bool {
        let address = address_of(listener);
        let mut listeners = self.listeners.lock();

        if !listeners.contains_key(identifier) {
            if let Err(e) = self.bridge.subscribe(identifier) {
                warn!("Failed to subscribe to '{}' on {} bridge: {}", identifier, self.bridge.name(), e);
            }
        }

        let handles = listeners.entry(identifier.to_string()).or_default();
        handles.retain(ListenerHandle::is_alive);

        if handles.iter().any(|h| h.refers_to(address)) {
            trace!("Listener already registered for '{}'", identifier);
            return false;
        }

        handles.push(ListenerHandle::new(listener));
        debug!("Added listener for '{}' ({} registered)", identifier, handles.len());
        true
    }

    /// Deregister a listener. Returns false when it was not registered.
    pub fn remove_listener<L: ObjectListener>(&self, identifier: &str, listener: &Arc<L>) -> bool {
        let address = address_of(listener);
        let mut listeners = self.listeners.lock();

        let (removed, now_empty) = match listeners.get_mut(identifier) {
            Some(handles) => {
                let removed = handles.iter().any(|h| h.refers_to(address));
                handles.retain(|h| h.is_alive() && !h.refers_to(address));
                (removed, handles.is_empty())
            }
            None => return false,
        };

        if now_empty {
            listeners.remove(identifier);
            self.unsubscribe(identifier);
        }

        if removed {
            debug!("Removed listener for '{}'", identifier);
        }
        removed
    }

    /// Live listeners for an identifier, for dispatch outside the lock.
    ///
    /// Dead handles are pruned; if none remain the identifier is torn down
    /// and `None` is returned.
    pub fn snapshot(&self, identifier: &str) -> Option<Vec<Arc<dyn ErasedListener>>> {
        let mut listeners = self.listeners.lock();
        let handles = listeners.get_mut(identifier)?;

        let live: Vec<Arc<dyn ErasedListener>> = handles.iter().filter_map(ListenerHandle::upgrade).collect();
        if live.len() != handles.len() {
            handles.retain(ListenerHandle::is_alive);
        }

        if handles.is_empty() {
            debug!("All listeners for '{}' were dropped", identifier);
            listeners.remove(identifier);
            self.unsubscribe(identifier);
            return None;
        }

        Some(live)
    }

    /// Drop dead handles everywhere; returns the number of identifiers torn down
    pub fn prune(&self) -> usize {
        let mut listeners = self.listeners.lock();

        let mut emptied = Vec::new();
        for (identifier, handles) in listeners.iter_mut() {
            handles.retain(ListenerHandle::is_alive);
            if handles.is_empty() {
                emptied.push(identifier.clone());
            }
        }

        for identifier in &emptied {
            listeners.remove(identifier);
            self.unsubscribe(identifier);
        }

        if !emptied.is_empty() {
            debug!("Pruned {} identifiers with no live listeners", emptied.len());
        }
        emptied.len()
    }

    /// Number of live listeners registered for an identifier
    pub fn listener_count(&self, identifier: &str) -> usize {
        self.listeners
            .lock()
            .get(identifier)
            .map(|handles| handles.iter().filter(|h| h.is_alive()).count())
            .unwrap_or(0)
    }

    /// Whether the identifier currently has a registry entry
    pub fn is_registered(&self, identifier: &str) -> bool {
        self.listeners.lock().contains_key(identifier)
    }

    /// Registered identifiers, sorted
    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self.listeners.lock().keys().cloned().collect();
        identifiers.sort();
        identifiers
    }

    /// Remove every entry without touching the bridge. Returns the identifiers
    /// that were registered.
    pub fn clear(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self.listeners.lock().drain().map(|(id, _)| id).collect();
        identifiers.sort();
        identifiers
    }

    fn unsubscribe(&self, identifier: &str) {
        if let Err(e) = self.bridge.unsubscribe(identifier) {
            warn!("Failed to unsubscribe from '{}' on {} bridge: {}", identifier, self.bridge.name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use crate::bridge::mock::{BridgeCall, RecordingBridge};

    fn noop_listener() -> Arc<FnListener<String, impl Fn(&str, String) + Send + Sync + 'static>> {
        listener_fn(|_: &str, _: String| {})
    }

    fn create_registry() -> (Arc<RecordingBridge>, ListenerRegistry) {
        let bridge = RecordingBridge::new();
        let registry = ListenerRegistry::new(bridge.clone());
        (bridge, registry)
    }

    #[test]
    fn test_first_add_subscribes_once() {
        let (bridge, registry) = create_registry();
        let first = noop_listener();
        let second = noop_listener();

        assert!(registry.add_listener("id", &first));
        assert!(registry.add_listener("id", &second));

        assert_eq!(bridge.count(&BridgeCall::Subscribe("id".to_string())), 1);
        assert_eq!(registry.listener_count("id"), 2);
        assert_eq!(bridge.subscriptions(), vec!["id".to_string()]);
    }

    #[test]
    fn test_duplicate_add_is_ignored() {
        let (_bridge, registry) = create_registry();
        let listener = noop_listener();

        assert!(registry.add_listener("id", &listener));
        assert!(!registry.add_listener("id", &listener));
        assert_eq!(registry.listener_count("id"), 1);
    }

    #[test]
    fn test_last_removal_unsubscribes() {
        let (bridge, registry) = create_registry();
        let first = noop_listener();
        let second = noop_listener();

        registry.add_listener("id", &first);
        registry.add_listener("id", &second);

        assert!(registry.remove_listener("id", &first));
        assert!(registry.is_registered("id"));
        assert_eq!(bridge.count(&BridgeCall::Unsubscribe("id".to_string())), 0);

        assert!(registry.remove_listener("id", &second));
        assert!(!registry.is_registered("id"));
        assert_eq!(bridge.count(&BridgeCall::Unsubscribe("id".to_string())), 1);
        assert!(bridge.subscriptions().is_empty());
    }

    #[test]
    fn test_remove_unknown_listener() {
        let (bridge, registry) = create_registry();
        let registered = noop_listener();
        let stranger = noop_listener();

        assert!(!registry.remove_listener("id", &registered));
        registry.add_listener("id", &registered);
        assert!(!registry.remove_listener("id", &stranger));
        assert!(!registry.remove_listener("other", &registered));

        assert_eq!(registry.listener_count("id"), 1);
        assert_eq!(bridge.count(&BridgeCall::Unsubscribe("id".to_string())), 0);
    }

    #[test]
    fn test_n_adds_n_minus_one_removes() {
        let (bridge, registry) = create_registry();
        let listeners: Vec<_> = (0..5).map(|_| noop_listener()).collect();

        for listener in &listeners {
            registry.add_listener("id", listener);
        }
        for listener in &listeners[1..] {
            registry.remove_listener("id", listener);
        }

        assert_eq!(bridge.subscriptions(), vec!["id".to_string()]);
        assert_eq!(
            bridge.calls(),
            vec![BridgeCall::Subscribe("id".to_string())]
        );
    }

    #[test]
    fn test_snapshot_skips_and_prunes_dead_listeners() {
        let (bridge, registry) = create_registry();
        let kept = noop_listener();
        let dropped = noop_listener();

        registry.add_listener("id", &kept);
        registry.add_listener("id", &dropped);
        drop(dropped);

        assert_eq!(registry.snapshot("id").unwrap().len(), 1);
        assert_eq!(registry.listener_count("id"), 1);

        drop(kept);
        assert!(registry.snapshot("id").is_none());
        assert!(!registry.is_registered("id"));
        assert_eq!(bridge.count(&BridgeCall::Unsubscribe("id".to_string())), 1);
    }

    #[test]
    fn test_snapshot_unknown_identifier() {
        let (bridge, registry) = create_registry();
        assert!(registry.snapshot("missing").is_none());
        assert!(bridge.calls().is_empty());
    }

    #[test]
    fn test_prune_tears_down_dead_identifiers() {
        let (bridge, registry) = create_registry();
        let alive = noop_listener();
        let dead = noop_listener();

        registry.add_listener("alive", &alive);
        registry.add_listener("dead", &dead);
        drop(dead);

        assert_eq!(registry.prune(), 1);
        assert_eq!(registry.identifiers(), vec!["alive".to_string()]);
        assert_eq!(bridge.subscriptions(), vec!["alive".to_string()]);
    }

    #[test]
    fn test_readd_after_teardown_subscribes_again() {
        let (bridge, registry) = create_registry();
        let listener = noop_listener();

        registry.add_listener("id", &listener);
        registry.remove_listener("id", &listener);
        registry.add_listener("id", &listener);

        assert_eq!(bridge.count(&BridgeCall::Subscribe("id".to_string())), 2);
        assert_eq!(bridge.count(&BridgeCall::Unsubscribe("id".to_string())), 1);
        assert!(registry.is_registered("id"));
    }

    #[test]
    fn test_clear_returns_identifiers() {
        let (bridge, registry) = create_registry();
        let listener = noop_listener();
        registry.add_listener("b", &listener);
        registry.add_listener("a", &listener);

        assert_eq!(registry.clear(), vec!["a".to_string(), "b".to_string()]);
        assert!(registry.identifiers().is_empty());
        assert_eq!(bridge.count(&BridgeCall::Unsubscribe("a".to_string())), 0);
    }

    #[test]
    fn test_concurrent_add_remove_is_consistent() {
        let (bridge, registry) = create_registry();
        let registry = Arc::new(registry);
        let keeper = noop_listener();
        registry.add_listener("shared", &keeper);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let listener = noop_listener();
                    for _ in 0..200 {
                        registry.add_listener("shared", &listener);
                        registry.add_listener("churn", &listener);
                        registry.remove_listener("shared", &listener);
                        registry.remove_listener("churn", &listener);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.listener_count("shared"), 1);
        assert!(!registry.is_registered("churn"));
        assert_eq!(bridge.subscriptions(), vec!["shared".to_string()]);
        assert_eq!(bridge.count(&BridgeCall::Subscribe("shared".to_string())), 1);
        assert_eq!(
            bridge.count(&BridgeCall::Subscribe("churn".to_string())),
            bridge.count(&BridgeCall::Unsubscribe("churn".to_string()))
        );
    }
}
