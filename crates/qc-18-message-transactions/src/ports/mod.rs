//! # Ports Layer
//!
//! Hexagonal architecture ports for the message transaction subsystem.
//!
//! - **Driving Ports (Inbound)**: block submission and relay admission
//! - **Driven Ports (Outbound)**: the chain store and block notifications

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
