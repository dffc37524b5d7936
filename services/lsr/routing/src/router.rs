//! Routing decision types and statistics

use lsr_wire::{LocalPort, NodeId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Routing decision result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Forward out of `port` toward `next_hop`
    Forward {
        /// Directly attached neighbor
        next_hop: NodeId,
        /// Local port leading to that neighbor
        port: LocalPort,
    },
    /// Deliver locally (we are the destination)
    Local,
    /// Drop packet
    Drop(DropReason),
}

/// Reason for dropping a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DropReason {
    /// No route to destination
    NoRoute,
    /// Routing loop detected while resolving the next hop
    RoutingLoop,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NoRoute => write!(f, "no route to destination"),
            DropReason::RoutingLoop => write!(f, "routing loop detected"),
        }
    }
}

/// Internal consistency errors raised while resolving a route
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// Following next hops did not reach a directly attached neighbor
    #[error("next-hop chain toward {destination} did not terminate after {hops} hops")]
    RoutingLoop {
        /// Destination being resolved
        destination: NodeId,
        /// Hops walked before giving up
        hops: usize,
    },
}

/// Router statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    /// Number of routing decisions made
    pub decisions_made: u64,
    /// Number of packets forwarded
    pub packets_forwarded: u64,
    /// Number of packets delivered locally
    pub packets_local: u64,
    /// Number of packets dropped
    pub packets_dropped: u64,
    /// Breakdown of drop reasons
    pub drop_reasons: BTreeMap<DropReason, u64>,
}

impl RouterStats {
    /// Count one routing decision
    pub fn record(&mut self, decision: &RoutingDecision) {
        self.decisions_made += 1;
        match decision {
            RoutingDecision::Forward { .. } => self.packets_forwarded += 1,
            RoutingDecision::Local => self.packets_local += 1,
            RoutingDecision::Drop(reason) => {
                self.packets_dropped += 1;
                *self.drop_reasons.entry(*reason).or_insert(0) += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_reason_display() {
        assert_eq!(DropReason::NoRoute.to_string(), "no route to destination");
        assert_eq!(DropReason::RoutingLoop.to_string(), "routing loop detected");
    }

    #[test]
    fn test_router_stats() {
        let mut stats = RouterStats::default();
        stats.record(&RoutingDecision::Local);
        stats.record(&RoutingDecision::Forward {
            next_hop: NodeId::from("B"),
            port: LocalPort(1),
        });
        stats.record(&RoutingDecision::Drop(DropReason::NoRoute));
        stats.record(&RoutingDecision::Drop(DropReason::NoRoute));

        assert_eq!(stats.decisions_made, 4);
        assert_eq!(stats.packets_local, 1);
        assert_eq!(stats.packets_forwarded, 1);
        assert_eq!(stats.packets_dropped, 2);
        assert_eq!(stats.drop_reasons.get(&DropReason::NoRoute), Some(&2));
    }
}
