//! groupcast: named objects shared between processes through a common
//! directory, with change notifications.
//!
//! A [`Sender`] persists an object under an identifier and signals that
//! identifier; every [`Receiver`] with a listener registered for it, in this
//! or any other process watching the same shared location, is called back
//! with the freshly stored object.

pub mod app;
pub mod bridge;
pub mod cli;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identifier;
pub mod location;
pub mod logging;
pub mod registry;
pub mod store;

pub use codec::Codec;
pub use config::GroupcastConfig;
pub use dispatch::{DispatchStats, Dispatcher, Receiver, Sender};
pub use error::{Error, Result};
pub use location::SharedLocation;
pub use registry::{listener_fn, ObjectListener};
