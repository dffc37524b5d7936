//! Single-source shortest paths over a link-state database.
//!
//! Every origin's adjacency contributes directed edges `origin -> neighbor`.
//! A neighbor that never appears as an origin (a client, or a router whose
//! advertisement has not arrived yet) is a terminal node: reachable, but
//! with no outgoing edges.
//!
//! Relaxation uses "on-or-improves": when a candidate distance equals the
//! current best, the path through the node just settled replaces the
//! recorded one. Among unsettled nodes at equal distance, the smallest
//! `NodeId` settles first, which makes the outcome deterministic.

use crate::link_state::{ComputedRoute, Lsdb};
use lsr_wire::NodeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Tentative state for one node during the search
struct Tentative<'a> {
    distance: u64,
    first_hop: Option<&'a NodeId>,
    hop_count: u32,
}

/// Compute shortest-path routes from `source` to every reachable node
pub fn compute_routes(lsdb: &Lsdb, source: &NodeId) -> BTreeMap<NodeId, ComputedRoute> {
    let mut nodes: BTreeSet<&NodeId> = BTreeSet::new();
    nodes.insert(source);
    for (origin, adjacency) in lsdb {
        nodes.insert(origin);
        nodes.extend(adjacency.keys());
    }

    let mut tentative: HashMap<&NodeId, Tentative<'_>> = HashMap::new();
    tentative.insert(
        source,
        Tentative {
            distance: 0,
            first_hop: None,
            hop_count: 0,
        },
    );
    let mut settled: HashSet<&NodeId> = HashSet::with_capacity(nodes.len());

    // O(V^2): topologies are small
    loop {
        let mut current: Option<(&NodeId, u64)> = None;
        for &node in &nodes {
            if settled.contains(node) {
                continue;
            }
            if let Some(state) = tentative.get(node) {
                if current.map_or(true, |(_, best)| state.distance < best) {
                    current = Some((node, state.distance));
                }
            }
        }
        let Some((current, distance)) = current else {
            break;
        };
        settled.insert(current);

        let (first_hop, hop_count) = match tentative.get(current) {
            Some(state) => (state.first_hop, state.hop_count),
            None => (None, 0),
        };

        // terminal nodes have no adjacency of their own
        let Some(adjacency) = lsdb.get(current) else {
            continue;
        };
        for (neighbor, link) in adjacency {
            if settled.contains(neighbor) {
                continue;
            }
            let candidate = distance.saturating_add(u64::from(link.cost));
            let improves = tentative
                .get(neighbor)
                .map_or(true, |state| candidate <= state.distance);
            if improves {
                tentative.insert(
                    neighbor,
                    Tentative {
                        distance: candidate,
                        first_hop: Some(first_hop.unwrap_or(neighbor)),
                        hop_count: hop_count + 1,
                    },
                );
            }
        }
    }

    let routes: BTreeMap<NodeId, ComputedRoute> = tentative
        .into_iter()
        .filter_map(|(dst, state)| {
            let next_hop = state.first_hop?;
            Some((
                dst.clone(),
                ComputedRoute {
                    dst_node: dst.clone(),
                    next_hop: next_hop.clone(),
                    total_cost: state.distance,
                    hop_count: state.hop_count,
                },
            ))
        })
        .collect();

    debug!(
        "Computed {} routes from node {} over {} known nodes",
        routes.len(),
        source,
        nodes.len()
    );
    routes
}
