//! Recording bridge for tests
//!
//! Wraps a [`LocalBridge`] and records every subscribe/unsubscribe/publish
//! call so tests can assert on the exact traffic reaching the bridge.

use std::sync::Arc;
use parking_lot::Mutex;

use crate::bridge::error::{BridgeError, BridgeResult};
use crate::bridge::local::{LocalBridge, SignalCenter};
use crate::bridge::traits::{NotificationBridge, SignalHandler};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCall {
    Subscribe(String),
    Unsubscribe(String),
    UnsubscribeAll,
    Publish(String),
}

pub struct RecordingBridge {
    inner: LocalBridge,
    calls: Mutex<Vec<BridgeCall>>,
    fail_publish: Mutex<bool>,
}

impl RecordingBridge {
    pub fn new() -> Arc<Self> {
        Self::on_center(&SignalCenter::new())
    }

    pub fn on_center(center: &Arc<SignalCenter>) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalBridge::new(center).expect("local bridge"),
            calls: Mutex::new(Vec::new()),
            fail_publish: Mutex::new(false),
        })
    }

    pub fn calls(&self) -> Vec<BridgeCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &BridgeCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn set_fail_publish(&self, fail: bool) {
        *self.fail_publish.lock() = fail;
    }
}

impl NotificationBridge for RecordingBridge {
    fn subscribe(&self, identifier: &str) -> BridgeResult<()> {
        self.calls.lock().push(BridgeCall::Subscribe(identifier.to_string()));
        self.inner.subscribe(identifier)
    }

    fn unsubscribe(&self, identifier: &str) -> BridgeResult<()> {
        self.calls.lock().push(BridgeCall::Unsubscribe(identifier.to_string()));
        self.inner.unsubscribe(identifier)
    }

    fn unsubscribe_all(&self) -> BridgeResult<()> {
        self.calls.lock().push(BridgeCall::UnsubscribeAll);
        self.inner.unsubscribe_all()
    }

    fn publish(&self, identifier: &str) -> BridgeResult<()> {
        self.calls.lock().push(BridgeCall::Publish(identifier.to_string()));
        if *self.fail_publish.lock() {
            return Err(BridgeError::Shutdown);
        }
        self.inner.publish(identifier)
    }

    fn attach(&self, handler: SignalHandler) {
        self.inner.attach(handler)
    }

    fn detach(&self) {
        self.inner.detach()
    }

    fn subscriptions(&self) -> Vec<String> {
        self.inner.subscriptions()
    }

    fn shutdown(&self) -> BridgeResult<()> {
        self.inner.shutdown()
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
