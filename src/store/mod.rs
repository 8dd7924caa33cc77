//! Durable keyed object store
//!
//! Byte payloads live in the shared directory, one file per identifier. The
//! store knows nothing about object types; see [`crate::codec`] for that.

pub mod error;
pub mod file_store;

pub use error::{StoreError, StoreResult};
pub use file_store::{ObjectStore, DEFAULT_EXTENSION};
