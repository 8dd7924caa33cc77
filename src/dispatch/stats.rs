//! Dispatch statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of a dispatcher's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Objects written to the store by `send_object`
    pub objects_sent: u64,

    /// Signals published after a successful write
    pub signals_published: u64,

    /// Publishes rejected by the bridge; the store was still updated
    pub publish_failures: u64,

    /// Inbound signals handed over by the bridge
    pub signals_received: u64,

    /// Inbound signals with no live listener
    pub signals_ignored: u64,

    /// Listener callbacks invoked
    pub callbacks_delivered: u64,

    /// Dispatches skipped because the object was missing or unreadable
    pub objects_missing: u64,

    /// Payloads that could not be decoded for a listener
    pub decode_failures: u64,

    /// Listener callbacks that panicked
    pub listener_panics: u64,
}

#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    objects_sent: AtomicU64,
    signals_published: AtomicU64,
    publish_failures: AtomicU64,
    signals_received: AtomicU64,
    signals_ignored: AtomicU64,
    callbacks_delivered: AtomicU64,
    objects_missing: AtomicU64,
    decode_failures: AtomicU64,
    listener_panics: AtomicU64,
}

macro_rules! counter {
    ($name:ident, $field:ident) => {
        pub(crate) fn $name(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl DispatchCounters {
    counter!(object_sent, objects_sent);
    counter!(signal_published, signals_published);
    counter!(publish_failed, publish_failures);
    counter!(signal_received, signals_received);
    counter!(signal_ignored, signals_ignored);
    counter!(callback_delivered, callbacks_delivered);
    counter!(object_missing, objects_missing);
    counter!(decode_failed, decode_failures);
    counter!(listener_panicked, listener_panics);

    pub(crate) fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            objects_sent: self.objects_sent.load(Ordering::Relaxed),
            signals_published: self.signals_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            signals_received: self.signals_received.load(Ordering::Relaxed),
            signals_ignored: self.signals_ignored.load(Ordering::Relaxed),
            callbacks_delivered: self.callbacks_delivered.load(Ordering::Relaxed),
            objects_missing: self.objects_missing.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
        }
    }
}
