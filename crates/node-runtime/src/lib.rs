//! # Node Runtime Library
//!
//! Exposes configuration and the runtime for the `node-runtime` binary and
//! its tests.
//!
//! ## Startup
//!
//! 1. Load configuration from the environment
//! 2. Open key store and chain store, rebuild the recent index
//! 3. Produce a block every `MSG_BLOCK_INTERVAL_SECS`, carrying pooled
//!    message transactions
//! 4. Stop on Ctrl+C

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod runtime;

pub use config::{ConfigError, NodeConfig};
pub use runtime::NodeRuntime;
