//! Notification Bridge
//!
//! Abstracts a system-wide, unordered, payload-less signal channel keyed by
//! identifier. A bridge endpoint subscribes per identifier, publishes
//! fire-and-forget, and hands inbound signals to a single attached handler.
//!
//! # Implementations
//!
//! - [`FsBridge`]: cross-process, signal files in the shared directory
//!   watched with `notify`
//! - [`LocalBridge`]: in-process [`SignalCenter`]; endpoints on the same
//!   center behave like separate processes
//!
//! Delivery is best-effort and may repeat; consumers must tolerate duplicate
//! and spurious signals.

pub mod error;
pub mod fs;
pub mod local;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;
use std::time::Duration;

pub use error::{BridgeError, BridgeResult};
pub use fs::FsBridge;
pub use local::{LocalBridge, SignalCenter};
pub use traits::{NotificationBridge, SignalHandler};

use crate::location::SharedLocation;

/// Which bridge implementation to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeKind {
    /// Signal files in the shared directory
    #[default]
    Fs,
    /// In-process only
    Local,
}

impl std::str::FromStr for BridgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fs" | "file" | "filesystem" => Ok(BridgeKind::Fs),
            "local" => Ok(BridgeKind::Local),
            _ => Err(format!("Invalid bridge kind: {}. Valid options: fs, local", s)),
        }
    }
}

impl std::fmt::Display for BridgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeKind::Fs => write!(f, "fs"),
            BridgeKind::Local => write!(f, "local"),
        }
    }
}

/// Open a bridge endpoint for a shared location
pub fn open_bridge(
    kind: BridgeKind,
    location: &SharedLocation,
    poll_interval: Option<Duration>,
) -> BridgeResult<Arc<dyn NotificationBridge>> {
    match kind {
        BridgeKind::Fs => Ok(Arc::new(FsBridge::for_location(location, poll_interval)?)),
        BridgeKind::Local => Ok(Arc::new(LocalBridge::standalone()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bridge_kind_parsing() {
        assert_eq!("fs".parse::<BridgeKind>().unwrap(), BridgeKind::Fs);
        assert_eq!("Filesystem".parse::<BridgeKind>().unwrap(), BridgeKind::Fs);
        assert_eq!("local".parse::<BridgeKind>().unwrap(), BridgeKind::Local);
        assert!("darwin".parse::<BridgeKind>().is_err());
    }

    #[test]
    fn test_open_bridge() {
        let temp_dir = TempDir::new().unwrap();
        let location = SharedLocation::new(temp_dir.path(), "group", "objects");

        let fs_bridge = open_bridge(BridgeKind::Fs, &location, None).unwrap();
        assert_eq!(fs_bridge.name(), "fs");
        assert!(location.signals_dir().is_dir());

        let local_bridge = open_bridge(BridgeKind::Local, &location, None).unwrap();
        assert_eq!(local_bridge.name(), "local");
    }
}
