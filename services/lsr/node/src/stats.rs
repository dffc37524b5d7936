//! Node statistics.

use lsr_routing::RouterStats;
use serde::Serialize;

/// Counters kept by one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    /// Data packet decisions
    pub routing: RouterStats,
    /// Advertisements accepted into the LSDB
    pub adverts_accepted: u64,
    /// Advertisements ignored as stale or duplicate
    pub adverts_stale: u64,
    /// Advertisements originated by this node
    pub adverts_originated: u64,
    /// Advertisement copies handed to the transport
    pub adverts_sent: u64,
    /// Inbound payloads that failed to decode
    pub malformed_payloads: u64,
}
