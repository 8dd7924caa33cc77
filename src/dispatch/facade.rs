//! Role-specific views over a shared dispatcher
//!
//! A [`Sender`] only writes and deletes; a [`Receiver`] reads, deletes and
//! listens. Both are pass-throughs and may share one [`Dispatcher`].

use std::sync::Arc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::GroupcastConfig;
use crate::dispatch::dispatcher::Dispatcher;
use crate::error::Result;
use crate::registry::ObjectListener;

/// Sending side of an exchange
#[derive(Clone)]
pub struct Sender {
    dispatcher: Arc<Dispatcher>,
}

impl Sender {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn open(config: &GroupcastConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(Dispatcher::open(config)?)))
    }

    /// Persist an object under an identifier and notify its listeners
    pub fn send_object<T: Serialize + ?Sized>(&self, object: &T, identifier: &str) {
        self.dispatcher.send_object(object, identifier)
    }

    /// Remove the object associated with an identifier
    pub fn delete_object(&self, identifier: &str) {
        self.dispatcher.delete_object(identifier)
    }

    /// Remove every object in the shared directory
    pub fn delete_all_objects(&self) {
        self.dispatcher.delete_all_objects()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

/// Receiving side of an exchange
#[derive(Clone)]
pub struct Receiver {
    dispatcher: Arc<Dispatcher>,
}

impl Receiver {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn open(config: &GroupcastConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(Dispatcher::open(config)?)))
    }

    /// The object currently stored for an identifier
    pub fn retrieve_object<T: DeserializeOwned>(&self, identifier: &str) -> Option<T> {
        self.dispatcher.retrieve_object(identifier)
    }

    /// Remove the object associated with an identifier
    pub fn delete_object(&self, identifier: &str) {
        self.dispatcher.delete_object(identifier)
    }

    /// Remove every object in the shared directory
    pub fn delete_all_objects(&self) {
        self.dispatcher.delete_all_objects()
    }

    /// Call `listener` whenever an object is sent under `identifier`
    pub fn add_listener<L: ObjectListener>(&self, identifier: &str, listener: &Arc<L>) {
        self.dispatcher.add_listener(identifier, listener);
    }

    /// Stop calling `listener` for `identifier`
    pub fn remove_listener<L: ObjectListener>(&self, identifier: &str, listener: &Arc<L>) {
        self.dispatcher.remove_listener(identifier, listener);
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}
