//! Application orchestration module

pub mod execution;
pub mod initialization;

pub use execution::{execute, run_command};
pub use initialization::{build_config, configure_logging, load_configuration};
