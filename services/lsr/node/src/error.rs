//! Node controller errors.

use lsr_routing::RoutingError;
use lsr_topology::TopologyError;
use lsr_wire::WireError;
use thiserror::Error;

/// Errors surfaced to the caller of a node event handler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// A local link event was rejected
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// The forwarding table is internally inconsistent
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// An outbound packet could not be encoded
    #[error("failed to encode outbound packet: {0}")]
    Wire(#[from] WireError),
}
