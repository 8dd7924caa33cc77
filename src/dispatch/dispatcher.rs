//! Dispatcher
//!
//! Composes the object store, the listener registry and a notification
//! bridge into the public send/retrieve/listen contract.
//!
//! Sending writes the object and, only if the write succeeded, publishes the
//! identifier. An inbound signal takes a snapshot of the live listeners for
//! the identifier under the registry lock, then, outside the lock, re-reads
//! the store for each listener and invokes it with the decoded object.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use log::{debug, error, trace, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bridge::{open_bridge, NotificationBridge, SignalHandler};
use crate::codec::Codec;
use crate::config::GroupcastConfig;
use crate::dispatch::stats::{DispatchCounters, DispatchStats};
use crate::error::{Error, Result};
use crate::identifier;
use crate::registry::{ListenerRegistry, ObjectListener};
use crate::store::ObjectStore;

/// State reachable from the bridge's signal handler
struct Inner {
    store: ObjectStore,
    codec: Codec,
    registry: ListenerRegistry,
    counters: DispatchCounters,
}

impl Inner {
    fn on_signal(&self, identifier: &str) {
        self.counters.signal_received();

        let listeners = match self.registry.snapshot(identifier) {
            Some(listeners) => listeners,
            None => {
                trace!("Signal '{}' has no live listeners", identifier);
                self.counters.signal_ignored();
                return;
            }
        };

        debug!("Dispatching '{}' to {} listeners", identifier, listeners.len());

        for listener in listeners {
            let payload = match self.store.get(identifier) {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    debug!("Object '{}' vanished before dispatch", identifier);
                    self.counters.object_missing();
                    continue;
                }
                Err(e) => {
                    warn!("Failed to read object '{}' for dispatch: {}", identifier, e);
                    self.counters.object_missing();
                    continue;
                }
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                listener.deliver(identifier, &payload, self.codec)
            }));

            match outcome {
                Ok(Ok(())) => self.counters.callback_delivered(),
                Ok(Err(e)) => {
                    warn!("Listener for '{}' could not decode object: {}", identifier, e);
                    self.counters.decode_failed();
                }
                Err(_) => {
                    error!("Listener for '{}' panicked", identifier);
                    self.counters.listener_panicked();
                }
            }
        }
    }
}

/// Wires store, registry and bridge together.
///
/// A dispatcher owns its bridge endpoint: it installs the signal handler on
/// construction and detaches it on shutdown. Share it through an `Arc`.
pub struct Dispatcher {
    inner: Arc<Inner>,
    bridge: Arc<dyn NotificationBridge>,
    shut_down: AtomicBool,
}

impl Dispatcher {
    pub fn new(store: ObjectStore, bridge: Arc<dyn NotificationBridge>, codec: Codec) -> Self {
        let inner = Arc::new(Inner {
            store,
            codec,
            registry: ListenerRegistry::new(Arc::clone(&bridge)),
            counters: DispatchCounters::default(),
        });

        // The handler must not keep the dispatcher alive
        let weak = Arc::downgrade(&inner);
        let handler: SignalHandler = Arc::new(move |identifier: &str| {
            if let Some(inner) = weak.upgrade() {
                inner.on_signal(identifier);
            }
        });
        bridge.attach(handler);

        debug!(
            "Dispatcher ready: store {}, {} codec, {} bridge",
            inner.store.directory().display(),
            codec,
            bridge.name()
        );

        Self {
            inner,
            bridge,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Open the store and bridge described by a configuration
    pub fn open(config: &GroupcastConfig) -> Result<Self> {
        let store = ObjectStore::with_directory(config.location.objects_dir(), config.extension.clone());
        let bridge = open_bridge(config.bridge, &config.location, config.poll_interval)?;
        Ok(Self::new(store, bridge, config.codec))
    }

    /// Store the object and signal its identifier.
    ///
    /// A publish failure is reported after the store was already updated;
    /// listeners are then not notified of this write.
    pub fn try_send_object<T: Serialize + ?Sized>(&self, object: &T, identifier: &str) -> Result<()> {
        if !identifier::is_valid(identifier) {
            return Err(Error::InvalidIdentifier);
        }

        let payload = self.inner.codec.encode(object)?;
        self.inner.store.put(identifier, &payload)?;
        self.inner.counters.object_sent();

        match self.bridge.publish(identifier) {
            Ok(()) => {
                self.inner.counters.signal_published();
                debug!("Sent '{}' ({} bytes)", identifier, payload.len());
                Ok(())
            }
            Err(e) => {
                self.inner.counters.publish_failed();
                Err(e.into())
            }
        }
    }

    /// Non-failing form of [`try_send_object`](Self::try_send_object);
    /// failures are logged. Empty identifiers are ignored.
    pub fn send_object<T: Serialize + ?Sized>(&self, object: &T, identifier: &str) {
        match self.try_send_object(object, identifier) {
            Ok(()) => {}
            Err(Error::InvalidIdentifier) => debug!("Ignoring send with empty identifier"),
            Err(e) => warn!("Failed to send '{}': {}", identifier, e),
        }
    }

    /// Load and decode the object stored for an identifier
    pub fn try_retrieve_object<T: DeserializeOwned>(&self, identifier: &str) -> Result<Option<T>> {
        if !identifier::is_valid(identifier) {
            return Err(Error::InvalidIdentifier);
        }

        match self.inner.store.get(identifier)? {
            Some(payload) => Ok(Some(self.inner.codec.decode(&payload)?)),
            None => Ok(None),
        }
    }

    /// `None` when the identifier is empty, nothing is stored, or the stored
    /// payload cannot be read or decoded
    pub fn retrieve_object<T: DeserializeOwned>(&self, identifier: &str) -> Option<T> {
        match self.try_retrieve_object(identifier) {
            Ok(object) => object,
            Err(Error::InvalidIdentifier) => None,
            Err(e) => {
                warn!("Failed to retrieve '{}': {}", identifier, e);
                None
            }
        }
    }

    pub fn try_delete_object(&self, identifier: &str) -> Result<()> {
        if !identifier::is_valid(identifier) {
            return Err(Error::InvalidIdentifier);
        }
        Ok(self.inner.store.delete(identifier)?)
    }

    pub fn delete_object(&self, identifier: &str) {
        match self.try_delete_object(identifier) {
            Ok(()) | Err(Error::InvalidIdentifier) => {}
            Err(e) => warn!("Failed to delete '{}': {}", identifier, e),
        }
    }

    /// Remove every stored object; returns the number of files removed
    pub fn try_delete_all_objects(&self) -> Result<usize> {
        Ok(self.inner.store.delete_all()?)
    }

    pub fn delete_all_objects(&self) {
        if let Err(e) = self.try_delete_all_objects() {
            warn!("Failed to delete stored objects: {}", e);
        }
    }

    /// Identifiers with a stored object
    pub fn stored_identifiers(&self) -> Result<Vec<String>> {
        Ok(self.inner.store.identifiers()?)
    }

    /// Register a listener; the dispatcher holds it weakly.
    ///
    /// Returns false for an empty identifier, a listener already registered
    /// for the identifier, or after shutdown.
    pub fn add_listener<L: ObjectListener>(&self, identifier: &str, listener: &Arc<L>) -> bool {
        if !identifier::is_valid(identifier) {
            debug!("Ignoring listener registration with empty identifier");
            return false;
        }
        if self.is_shut_down() {
            warn!("Ignoring listener registration for '{}' after shutdown", identifier);
            return false;
        }
        self.inner.registry.add_listener(identifier, listener)
    }

    /// Deregister a listener. Returns false if it was not registered.
    pub fn remove_listener<L: ObjectListener>(&self, identifier: &str, listener: &Arc<L>) -> bool {
        if !identifier::is_valid(identifier) {
            return false;
        }
        self.inner.registry.remove_listener(identifier, listener)
    }

    /// Tear down subscriptions of identifiers whose listeners were all dropped
    pub fn prune_listeners(&self) -> usize {
        self.inner.registry.prune()
    }

    /// Dispatch a signal as if it had arrived from the bridge
    pub fn handle_signal(&self, identifier: &str) {
        if identifier::is_valid(identifier) && !self.is_shut_down() {
            self.inner.on_signal(identifier);
        }
    }

    pub fn listener_count(&self, identifier: &str) -> usize {
        self.inner.registry.listener_count(identifier)
    }

    /// Identifiers with registered listeners
    pub fn registered_identifiers(&self) -> Vec<String> {
        self.inner.registry.identifiers()
    }

    /// Identifiers subscribed on the bridge
    pub fn subscriptions(&self) -> Vec<String> {
        self.bridge.subscriptions()
    }

    pub fn stats(&self) -> DispatchStats {
        self.inner.counters.snapshot()
    }

    pub fn store(&self) -> &ObjectStore {
        &self.inner.store
    }

    pub fn codec(&self) -> Codec {
        self.inner.codec
    }

    pub fn bridge_name(&self) -> &'static str {
        self.bridge.name()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stop receiving signals and drop every subscription. Idempotent; also
    /// runs on drop.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        self.bridge.detach();
        let identifiers = self.inner.registry.clear();

        if let Err(e) = self.bridge.unsubscribe_all() {
            warn!("Failed to drop {} bridge subscriptions: {}", self.bridge.name(), e);
        }
        if let Err(e) = self.bridge.shutdown() {
            warn!("Failed to shut down {} bridge: {}", self.bridge.name(), e);
        }

        debug!("Dispatcher shut down ({} identifiers unsubscribed)", identifiers.len());
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
