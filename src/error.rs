//! Crate-level error type

use thiserror::Error;

use crate::bridge::BridgeError;
use crate::codec::CodecError;
use crate::store::StoreError;

/// Result type for dispatcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a keyed dispatcher operation can report
#[derive(Debug, Error)]
pub enum Error {
    /// Empty identifier passed to a keyed operation
    #[error("Identifier must not be empty")]
    InvalidIdentifier,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Subscribe, unsubscribe or publish failed on the signal channel
    #[error("Signal delivery failed: {0}")]
    Bridge(#[from] BridgeError),
}
