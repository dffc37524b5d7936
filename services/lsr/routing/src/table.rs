//! Forwarding table derived from the link-state database

use crate::router::{DropReason, RoutingDecision, RoutingError};
use lsr_topology::{compute_routes, ComputedRoute, Lsdb};
use lsr_wire::{Adjacency, LocalPort, NodeId};
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::debug;

/// Destination -> next hop, as computed from one LSDB snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingTable {
    /// Local node ID
    local_node_id: NodeId,
    /// Routes to every reachable destination
    routes: BTreeMap<NodeId, ComputedRoute>,
}

impl ForwardingTable {
    /// Create an empty forwarding table
    pub fn new(local_node_id: NodeId) -> Self {
        Self {
            local_node_id,
            routes: BTreeMap::new(),
        }
    }

    /// Build the forwarding table for `local_node_id` from an LSDB snapshot
    pub fn compute(lsdb: &Lsdb, local_node_id: &NodeId) -> Self {
        Self {
            local_node_id: local_node_id.clone(),
            routes: compute_routes(lsdb, local_node_id),
        }
    }

    /// Next hop toward `dst`, if reachable
    pub fn next_hop(&self, dst: &NodeId) -> Option<&NodeId> {
        self.routes.get(dst).map(|route| &route.next_hop)
    }

    /// Get route to a specific destination
    pub fn route(&self, dst: &NodeId) -> Option<&ComputedRoute> {
        self.routes.get(dst)
    }

    /// Get all computed routes
    pub fn routes(&self) -> &BTreeMap<NodeId, ComputedRoute> {
        &self.routes
    }

    /// Number of reachable destinations
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no destination is reachable
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve `dst` to a directly attached neighbor and the local port leading to it.
    ///
    /// Walks the next-hop chain until it reaches a node in `adjacency`. The
    /// walk is capped at the number of known destinations.
    pub fn resolve_port(
        &self,
        dst: &NodeId,
        adjacency: &Adjacency,
    ) -> Result<Option<(NodeId, LocalPort)>, RoutingError> {
        let max_hops = self.routes.len() + 1;
        let mut hop = dst;
        for _ in 0..max_hops {
            let Some(next) = self.next_hop(hop) else {
                return Ok(None);
            };
            if let Some(link) = adjacency.get(next) {
                return Ok(Some((next.clone(), link.port)));
            }
            hop = next;
        }

        Err(RoutingError::RoutingLoop {
            destination: dst.clone(),
            hops: max_hops,
        })
    }

    /// Decide what to do with a data packet addressed to `dst`
    pub fn decide(&self, dst: &NodeId, adjacency: &Adjacency) -> Result<RoutingDecision, RoutingError> {
        if *dst == self.local_node_id {
            return Ok(RoutingDecision::Local);
        }

        match self.resolve_port(dst, adjacency)? {
            Some((next_hop, port)) => Ok(RoutingDecision::Forward { next_hop, port }),
            None => {
                debug!("No route to destination {}", dst);
                Ok(RoutingDecision::Drop(DropReason::NoRoute))
            }
        }
    }

    /// Human-readable dump, one destination per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "forwarding ({} destinations):", self.routes.len());
        for (dst, route) in &self.routes {
            let _ = writeln!(
                out,
                "  {} via {} (cost {}, {} hops)",
                dst, route.next_hop, route.total_cost, route.hop_count
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsr_wire::LinkRecord;

    fn node(id: &str) -> NodeId {
        NodeId::from(id)
    }

    fn route(dst: &str, next_hop: &str, total_cost: u64) -> ComputedRoute {
        ComputedRoute {
            dst_node: node(dst),
            next_hop: node(next_hop),
            total_cost,
            hop_count: 1,
        }
    }

    fn table(routes: &[(&str, &str)]) -> ForwardingTable {
        ForwardingTable {
            local_node_id: node("A"),
            routes: routes
                .iter()
                .map(|(dst, nh)| (node(dst), route(dst, nh, 1)))
                .collect(),
        }
    }

    fn adjacency(links: &[(&str, u32)]) -> Adjacency {
        links
            .iter()
            .map(|(peer, port)| (node(peer), LinkRecord::new(*port, 1)))
            .collect()
    }

    #[test]
    fn test_compute_from_lsdb() {
        let mut lsdb = Lsdb::new();
        lsdb.insert(node("A"), adjacency(&[("B", 1)]));
        lsdb.insert(node("B"), adjacency(&[("A", 4), ("C", 5)]));

        let table = ForwardingTable::compute(&lsdb, &node("A"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.next_hop(&node("C")), Some(&node("B")));
        assert_eq!(table.route(&node("C")).map(|r| r.total_cost), Some(2));
        assert_eq!(table.next_hop(&node("Z")), None);
    }

    #[test]
    fn test_decide() {
        let table = table(&[("B", "B"), ("C", "B")]);
        let adj = adjacency(&[("B", 7)]);

        assert_eq!(table.decide(&node("A"), &adj), Ok(RoutingDecision::Local));
        assert_eq!(
            table.decide(&node("C"), &adj),
            Ok(RoutingDecision::Forward {
                next_hop: node("B"),
                port: LocalPort(7)
            })
        );
        assert_eq!(
            table.decide(&node("Z"), &adj),
            Ok(RoutingDecision::Drop(DropReason::NoRoute))
        );
    }

    #[test]
    fn test_resolve_follows_predecessor_chain() {
        // D -> C -> B, and only B is attached
        let table = table(&[("D", "C"), ("C", "B"), ("B", "B")]);
        let adj = adjacency(&[("B", 2)]);
        assert_eq!(
            table.resolve_port(&node("D"), &adj),
            Ok(Some((node("B"), LocalPort(2))))
        );
    }

    #[test]
    fn test_resolve_detects_cycle() {
        let table = table(&[("C", "D"), ("D", "C")]);
        let adj = adjacency(&[("B", 2)]);
        assert!(matches!(
            table.resolve_port(&node("C"), &adj),
            Err(RoutingError::RoutingLoop { .. })
        ));
    }

    #[test]
    fn test_render() {
        let text = table(&[("B", "B")]).render();
        assert!(text.contains("B via B (cost 1, 1 hops)"));
    }
}
