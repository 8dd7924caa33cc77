//! Notification bridge trait
//!
//! A bridge abstracts a system-wide, unordered, payload-less signal channel.
//! Signals carry only an identifier; receivers re-read the store for data.

use std::sync::Arc;

use crate::bridge::error::BridgeResult;

/// Callback invoked by a bridge for every inbound signal on a subscribed
/// identifier. Runs on a thread owned by the bridge.
pub type SignalHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// System-wide signal channel keyed by identifier
pub trait NotificationBridge: Send + Sync {
    /// Start delivering signals for an identifier to the attached handler
    fn subscribe(&self, identifier: &str) -> BridgeResult<()>;

    /// Stop delivering signals for an identifier
    fn unsubscribe(&self, identifier: &str) -> BridgeResult<()>;

    /// Drop every subscription held by this endpoint
    fn unsubscribe_all(&self) -> BridgeResult<()>;

    /// Signal every subscriber of an identifier, in any process, including
    /// this one. Does not wait for delivery.
    fn publish(&self, identifier: &str) -> BridgeResult<()>;

    /// Install the inbound handler, replacing any previous one
    fn attach(&self, handler: SignalHandler);

    /// Remove the inbound handler; signals arriving afterwards are dropped
    fn detach(&self);

    /// Identifiers currently subscribed, sorted
    fn subscriptions(&self) -> Vec<String>;

    /// Stop background delivery. Further publishes fail with `Shutdown`.
    fn shutdown(&self) -> BridgeResult<()>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
