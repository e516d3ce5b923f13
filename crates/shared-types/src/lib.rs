//! # Shared Types Crate
//!
//! This crate contains the chain entities every subsystem agrees on.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Blocks and transactions are defined once.
//! - **Canonical Encoding**: Ids are hashes of one fixed byte layout, so
//!   independent nodes derive bit-identical ids.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
