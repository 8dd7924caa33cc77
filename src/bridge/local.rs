//! In-process signal center
//!
//! A [`SignalCenter`] stands in for the system-wide channel inside a single
//! process. Every [`LocalBridge`] joined to the same center behaves like a
//! separate process: publishing on any endpoint signals every endpoint
//! subscribed to the identifier, including the publisher. Each endpoint
//! delivers on its own worker thread so publishing never runs handlers
//! inline.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::bridge::error::{BridgeError, BridgeResult};
use crate::bridge::traits::{NotificationBridge, SignalHandler};
use crate::identifier;

/// Shared state of one endpoint, reachable from the center
struct Endpoint {
    subscriptions: Mutex<HashSet<String>>,
    sender: Mutex<Option<Sender<String>>>,
}

impl Endpoint {
    fn deliver(&self, identifier: &str) {
        if !self.subscriptions.lock().contains(identifier) {
            return;
        }
        if let Some(sender) = self.sender.lock().as_ref() {
            // The worker only disappears on shutdown
            let _ = sender.send(identifier.to_string());
        }
    }
}

/// Process-local stand-in for a system-wide notification center
#[derive(Default)]
pub struct SignalCenter {
    endpoints: Mutex<Vec<Weak<Endpoint>>>,
}

impl SignalCenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn join(&self, endpoint: &Arc<Endpoint>) {
        let mut endpoints = self.endpoints.lock();
        endpoints.retain(|e| e.strong_count() > 0);
        endpoints.push(Arc::downgrade(endpoint));
    }

    /// Signal every subscribed endpoint
    pub fn post(&self, identifier: &str) {
        let live: Vec<Arc<Endpoint>> = {
            let mut endpoints = self.endpoints.lock();
            endpoints.retain(|e| e.strong_count() > 0);
            endpoints.iter().filter_map(Weak::upgrade).collect()
        };

        trace!("Posting signal '{}' to {} endpoints", identifier, live.len());
        for endpoint in live {
            endpoint.deliver(identifier);
        }
    }

    /// Number of endpoints still joined
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.lock().iter().filter(|e| e.strong_count() > 0).count()
    }
}

/// Bridge endpoint on a [`SignalCenter`]
pub struct LocalBridge {
    center: Arc<SignalCenter>,
    endpoint: Arc<Endpoint>,
    handler: Arc<Mutex<Option<SignalHandler>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    shut_down: AtomicBool,
}

impl LocalBridge {
    /// Join an existing center
    pub fn new(center: &Arc<SignalCenter>) -> BridgeResult<Self> {
        let (sender, receiver) = unbounded();
        let handler: Arc<Mutex<Option<SignalHandler>>> = Arc::new(Mutex::new(None));

        let endpoint = Arc::new(Endpoint {
            subscriptions: Mutex::new(HashSet::new()),
            sender: Mutex::new(Some(sender)),
        });

        let worker = {
            let endpoint = Arc::downgrade(&endpoint);
            let handler = Arc::clone(&handler);
            thread::Builder::new()
                .name("groupcast-local-signals".to_string())
                .spawn(move || Self::run(receiver, endpoint, handler))
                .map_err(|e| BridgeError::io("<local worker>", e))?
        };
        let worker_id = worker.thread().id();

        center.join(&endpoint);
        debug!("Joined local signal center ({} endpoints)", center.endpoint_count());

        Ok(Self {
            center: Arc::clone(center),
            endpoint,
            handler,
            worker: Mutex::new(Some(worker)),
            worker_id,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Endpoint on a private center of its own
    pub fn standalone() -> BridgeResult<Self> {
        Self::new(&SignalCenter::new())
    }

    pub fn center(&self) -> &Arc<SignalCenter> {
        &self.center
    }

    fn run(receiver: Receiver<String>, endpoint: Weak<Endpoint>, handler: Arc<Mutex<Option<SignalHandler>>>) {
        while let Ok(identifier) = receiver.recv() {
            // Unsubscribed while the signal was queued
            let subscribed = match endpoint.upgrade() {
                Some(endpoint) => endpoint.subscriptions.lock().contains(&identifier),
                None => break,
            };
            if !subscribed {
                trace!("Dropping queued signal '{}' after unsubscribe", identifier);
                continue;
            }

            let current = handler.lock().clone();
            match current {
                Some(handler) => handler(&identifier),
                None => trace!("No handler attached for signal '{}'", identifier),
            }
        }
        debug!("Local signal worker stopped");
    }

    fn check_running(&self) -> BridgeResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            Err(BridgeError::Shutdown)
        } else {
            Ok(())
        }
    }
}

impl NotificationBridge for LocalBridge {
    fn subscribe(&self, identifier: &str) -> BridgeResult<()> {
        self.check_running()?;
        if !identifier::is_valid(identifier) {
            return Err(BridgeError::InvalidIdentifier);
        }
        if self.endpoint.subscriptions.lock().insert(identifier.to_string()) {
            debug!("Subscribed to local signal '{}'", identifier);
        }
        Ok(())
    }

    fn unsubscribe(&self, identifier: &str) -> BridgeResult<()> {
        if !identifier::is_valid(identifier) {
            return Err(BridgeError::InvalidIdentifier);
        }
        if self.endpoint.subscriptions.lock().remove(identifier) {
            debug!("Unsubscribed from local signal '{}'", identifier);
        }
        Ok(())
    }

    fn unsubscribe_all(&self) -> BridgeResult<()> {
        let mut subscriptions = self.endpoint.subscriptions.lock();
        debug!("Dropping {} local signal subscriptions", subscriptions.len());
        subscriptions.clear();
        Ok(())
    }

    fn publish(&self, identifier: &str) -> BridgeResult<()> {
        self.check_running()?;
        if !identifier::is_valid(identifier) {
            return Err(BridgeError::InvalidIdentifier);
        }
        self.center.post(identifier);
        Ok(())
    }

    fn attach(&self, handler: SignalHandler) {
        *self.handler.lock() = Some(handler);
    }

    fn detach(&self) {
        self.handler.lock().take();
    }

    fn subscriptions(&self) -> Vec<String> {
        let mut subscriptions: Vec<String> = self.endpoint.subscriptions.lock().iter().cloned().collect();
        subscriptions.sort();
        subscriptions
    }

    fn shutdown(&self) -> BridgeResult<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Closing the channel ends the worker loop
        self.endpoint.sender.lock().take();

        if let Some(worker) = self.worker.lock().take() {
            if thread::current().id() == self.worker_id {
                debug!("Local bridge shut down from its own worker; not joining");
            } else if worker.join().is_err() {
                warn!("Local signal worker panicked");
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

impl Drop for LocalBridge {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
