//! Topology store errors.

use lsr_wire::{LocalPort, NodeId};
use thiserror::Error;

/// Errors raised when a local link event is rejected at the boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// Link-up with a cost that is negative or too large to advertise
    #[error("invalid link to {peer}: cost {cost} is out of range")]
    InvalidLink {
        /// Peer on the other end of the rejected link
        peer: NodeId,
        /// Requested cost
        cost: i64,
    },

    /// Link-down for a port with no recorded adjacency
    #[error("no link recorded on port {0}")]
    UnknownPort(LocalPort),
}
