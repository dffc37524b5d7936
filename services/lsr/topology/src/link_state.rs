//! Link-state topology database and shortest path computation.

use lsr_wire::{Adjacency, NodeId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Link-state database: origin -> advertised adjacency
pub type Lsdb = BTreeMap<NodeId, Adjacency>;

/// Highest accepted sequence number per origin
pub type SequenceTable = BTreeMap<NodeId, u64>;

/// Outcome of offering an advertisement to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// The advertisement was fresh and replaced the origin's entry
    Accepted,
    /// The advertisement carried no new information and was ignored
    Stale,
}

/// Computed route information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputedRoute {
    /// Destination node
    pub dst_node: NodeId,
    /// Neighbor of the local node to forward through
    pub next_hop: NodeId,
    /// Total cost to reach destination
    pub total_cost: u64,
    /// Number of hops to destination
    pub hop_count: u32,
}

/// Link-state topology store for one node
///
/// The local node's own entry is authoritative and changes only through
/// [`TopologyStore::apply_local_link_up`] and
/// [`TopologyStore::apply_local_link_down`]. Every other entry is a replica
/// of the last fresh advertisement from that origin.
#[derive(Debug)]
pub struct TopologyStore {
    /// Local node ID
    local_node_id: NodeId,
    /// Adjacency of every known origin, including ourselves
    lsdb: Lsdb,
    /// Sequence numbers, ours included
    sequences: SequenceTable,
}

/// Topology store statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyStats {
    /// Number of origins in the LSDB, including the local node
    pub total_origins: usize,
    /// Number of advertised links across all origins
    pub total_links: usize,
    /// Current local sequence number
    pub local_sequence: u64,
}

// Include implementation
mod database;
