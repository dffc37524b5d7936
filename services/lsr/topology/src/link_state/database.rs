//! TopologyStore implementation methods.

use super::{Acceptance, Lsdb, SequenceTable, TopologyStats, TopologyStore};
use crate::error::TopologyError;
use lsr_wire::{Adjacency, Cost, LinkRecord, LocalPort, NodeId};
use std::fmt::Write;
use tracing::{debug, info};

impl TopologyStore {
    /// Create a new store holding only an empty entry for the local node
    pub fn new(local_node_id: NodeId) -> Self {
        let mut lsdb = Lsdb::new();
        lsdb.insert(local_node_id.clone(), Adjacency::new());
        let mut sequences = SequenceTable::new();
        sequences.insert(local_node_id.clone(), 0);

        Self {
            local_node_id,
            lsdb,
            sequences,
        }
    }

    /// Local node ID
    pub fn local_node_id(&self) -> &NodeId {
        &self.local_node_id
    }

    /// Record a link to `peer` on `port`, replacing whatever used that port or peer
    pub fn apply_local_link_up(
        &mut self,
        peer: NodeId,
        port: LocalPort,
        cost: i64,
    ) -> Result<(), TopologyError> {
        let cost = Cost::try_from(cost).map_err(|_| TopologyError::InvalidLink {
            peer: peer.clone(),
            cost,
        })?;

        let own = self.own_adjacency_mut();
        own.retain(|neighbor, link| link.port != port || *neighbor == peer);
        if let Some(previous) = own.insert(peer.clone(), LinkRecord { port, cost }) {
            debug!(%peer, old_port = %previous.port, new_port = %port, "replaced existing link");
        }

        info!(%peer, %port, cost, "local link up");
        Ok(())
    }

    /// Remove the link recorded on `port`, returning the peer it led to
    pub fn apply_local_link_down(&mut self, port: LocalPort) -> Result<NodeId, TopologyError> {
        let own = self.own_adjacency_mut();
        let peer = own
            .iter()
            .find(|(_, link)| link.port == port)
            .map(|(peer, _)| peer.clone())
            .ok_or(TopologyError::UnknownPort(port))?;
        own.remove(&peer);

        info!(%peer, %port, "local link down");
        Ok(peer)
    }

    /// Get the next sequence number for local advertisements
    pub fn next_local_sequence(&mut self) -> u64 {
        let seq = self.sequences.entry(self.local_node_id.clone()).or_insert(0);
        *seq += 1;
        *seq
    }

    /// Offer an advertisement; the origin's entry is replaced only if `sequence` is newer
    pub fn try_accept(&mut self, origin: &NodeId, sequence: u64, adjacency: Adjacency) -> Acceptance {
        if *origin == self.local_node_id {
            debug!(%origin, sequence, "ignoring advertisement for our own entry");
            return Acceptance::Stale;
        }

        let known = self.sequence_for(origin);
        if sequence <= known {
            debug!(%origin, sequence, known, "ignoring stale advertisement");
            return Acceptance::Stale;
        }

        info!(
            %origin,
            sequence,
            neighbors = adjacency.len(),
            "accepted advertisement"
        );
        self.sequences.insert(origin.clone(), sequence);
        self.lsdb.insert(origin.clone(), adjacency);
        Acceptance::Accepted
    }

    /// Immutable view of the whole LSDB
    pub fn snapshot(&self) -> &Lsdb {
        &self.lsdb
    }

    /// The local node's own adjacency
    pub fn local_adjacency(&self) -> &Adjacency {
        // seeded in new() and never removed
        self.lsdb.get(&self.local_node_id).unwrap_or(&EMPTY_ADJACENCY)
    }

    /// Highest accepted sequence for `origin`, 0 if none seen yet
    pub fn sequence_for(&self, origin: &NodeId) -> u64 {
        self.sequences.get(origin).copied().unwrap_or(0)
    }

    /// Get topology statistics
    pub fn stats(&self) -> TopologyStats {
        TopologyStats {
            total_origins: self.lsdb.len(),
            total_links: self.lsdb.values().map(|adj| adj.len()).sum(),
            local_sequence: self.sequence_for(&self.local_node_id),
        }
    }

    /// Human-readable dump of the LSDB and sequence table.
    ///
    /// Ports are shown only for the local entry; a foreign entry's ports
    /// belong to its origin.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "lsdb ({} origins):", self.lsdb.len());
        for (origin, adjacency) in &self.lsdb {
            let links: Vec<String> = adjacency
                .iter()
                .map(|(neighbor, link)| {
                    if *origin == self.local_node_id {
                        format!("{}(port {}, cost {})", neighbor, link.port, link.cost)
                    } else {
                        format!("{}(cost {})", neighbor, link.cost)
                    }
                })
                .collect();
            let _ = writeln!(out, "  {} -> [{}]", origin, links.join(", "));
        }

        let sequences: Vec<String> = self
            .sequences
            .iter()
            .map(|(origin, seq)| format!("{}={}", origin, seq))
            .collect();
        let _ = writeln!(out, "sequences: {}", sequences.join(" "));
        out
    }

    fn own_adjacency_mut(&mut self) -> &mut Adjacency {
        self.lsdb.entry(self.local_node_id.clone()).or_default()
    }
}

static EMPTY_ADJACENCY: Adjacency = Adjacency::new();
