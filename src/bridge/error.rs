//! Notification Bridge Error Types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failures of the external signal channel
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Empty identifier passed to subscribe/unsubscribe/publish
    #[error("Signal identifier must not be empty")]
    InvalidIdentifier,

    /// Signal file or directory could not be written
    #[error("Signal I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The directory watcher could not be created or configured
    #[error("Signal watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// The bridge has been shut down
    #[error("Notification bridge is shut down")]
    Shutdown,
}

impl BridgeError {
    /// Create an I/O error for the given path
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
