//! Dispatcher and role facades
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use groupcast::bridge::FsBridge;
//! use groupcast::codec::Codec;
//! use groupcast::dispatch::Dispatcher;
//! use groupcast::location::SharedLocation;
//! use groupcast::registry::listener_fn;
//! use groupcast::store::ObjectStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let location = SharedLocation::resolve("group.example.app", "objects");
//! let bridge = Arc::new(FsBridge::for_location(&location, None)?);
//! let dispatcher = Dispatcher::new(ObjectStore::new(&location), bridge, Codec::Json);
//!
//! let listener = listener_fn(|identifier: &str, score: u32| {
//!     println!("{} is now {}", identifier, score);
//! });
//! dispatcher.add_listener("score", &listener);
//!
//! dispatcher.send_object(&42u32, "score");
//! assert_eq!(dispatcher.retrieve_object::<u32>("score"), Some(42));
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod facade;
pub mod stats;


pub use dispatcher::Dispatcher;
pub use facade::{Receiver, Sender};
pub use stats::DispatchStats;
