//! Flooding engine and event-driven node controller for lsr.
//!
//! A [`Node`] owns all of one router's protocol state and is driven entirely
//! by its event handlers: inbound payloads, local link changes, and clock
//! ticks. Outbound traffic leaves through a [`Transport`] supplied by the
//! surrounding harness.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod error;
pub mod flooding;
pub mod stats;
pub mod transport;

pub use config::NodeConfig;
pub use controller::{Node, PacketOutcome};
pub use error::NodeError;
pub use flooding::FloodingEngine;
pub use stats::NodeStats;
pub use transport::{QueueTransport, Transport};
