//! Event-driven node controller.
//!
//! Each handler runs to completion before the next event is admitted; the
//! node never blocks and never observes delivery of what it sends.

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::flooding::FloodingEngine;
use crate::stats::NodeStats;
use crate::transport::Transport;
use lsr_routing::{DropReason, ForwardingTable, RoutingDecision};
use lsr_topology::{Acceptance, TopologyStore};
use lsr_wire::{Advertisement, DataPacket, LinkChange, LocalPort, NodeId, Packet, WireError};
use std::fmt::Write;
use tracing::{debug, error, info};

/// What a node did with one inbound payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Data packet was forwarded, delivered, or dropped
    Routed(RoutingDecision),
    /// Advertisement was accepted or found stale
    Advertisement(Acceptance),
    /// Payload did not decode and was dropped
    Malformed(WireError),
}

/// A single routing node and all of its protocol state
#[derive(Debug)]
pub struct Node<T: Transport> {
    config: NodeConfig,
    store: TopologyStore,
    table: ForwardingTable,
    transport: T,
    stats: NodeStats,
    /// Time of the last periodic refresh
    last_announced_ms: u64,
}

impl<T: Transport> Node<T> {
    /// Create a node with no links
    pub fn new(node_id: NodeId, config: NodeConfig, transport: T) -> Self {
        Self {
            config,
            table: ForwardingTable::new(node_id.clone()),
            store: TopologyStore::new(node_id),
            transport,
            stats: NodeStats::default(),
            last_announced_ms: 0,
        }
    }

    /// This node's id
    pub fn node_id(&self) -> &NodeId {
        self.store.local_node_id()
    }

    /// Classify and handle a raw inbound payload
    pub fn handle_payload(&mut self, from_port: LocalPort, payload: &[u8]) -> Result<PacketOutcome, NodeError> {
        match lsr_wire::decode(payload) {
            Ok(Packet::Data(packet)) => self.on_data_packet(from_port, packet).map(PacketOutcome::Routed),
            Ok(Packet::Control(advertisement)) => self
                .on_control_packet(from_port, advertisement)
                .map(PacketOutcome::Advertisement),
            Err(e) => {
                self.stats.malformed_payloads += 1;
                debug!(port = %from_port, error = %e, "dropping malformed payload");
                Ok(PacketOutcome::Malformed(e))
            }
        }
    }

    /// Forward a data packet along the current forwarding table
    pub fn on_data_packet(
        &mut self,
        from_port: LocalPort,
        mut packet: DataPacket,
    ) -> Result<RoutingDecision, NodeError> {
        packet.record_hop(self.store.local_node_id());

        let decision = match self.table.decide(&packet.dst, self.store.local_adjacency()) {
            Ok(decision) => decision,
            Err(e) => {
                self.stats.routing.record(&RoutingDecision::Drop(DropReason::RoutingLoop));
                error!(dst = %packet.dst, error = %e, "forwarding table is inconsistent");
                return Err(e.into());
            }
        };
        self.stats.routing.record(&decision);

        match &decision {
            RoutingDecision::Forward { next_hop, port } => {
                debug!(
                    src = %packet.src,
                    dst = %packet.dst,
                    %next_hop,
                    in_port = %from_port,
                    out_port = %port,
                    "forwarding data packet"
                );
                let payload = lsr_wire::encode(&Packet::Data(packet))?;
                self.transport.send(*port, payload);
            }
            RoutingDecision::Local => {
                info!(src = %packet.src, trace = ?packet.trace, "delivered data packet");
            }
            RoutingDecision::Drop(reason) => {
                debug!(src = %packet.src, dst = %packet.dst, %reason, "dropping data packet");
            }
        }

        Ok(decision)
    }

    /// Handle an inbound advertisement
    pub fn on_control_packet(
        &mut self,
        from_port: LocalPort,
        advertisement: Advertisement,
    ) -> Result<Acceptance, NodeError> {
        self.flooding().on_advertisement(from_port, advertisement)
    }

    /// A link to `peer` came up on `port`
    pub fn on_link_up(&mut self, port: LocalPort, peer: NodeId, cost: i64) -> Result<Advertisement, NodeError> {
        self.store.apply_local_link_up(peer.clone(), port, cost)?;

        let mut flooding = self.flooding();
        flooding.recompute();
        flooding.originate(LinkChange::Add(peer))
    }

    /// The link on `port` went down
    pub fn on_link_down(&mut self, port: LocalPort) -> Result<Advertisement, NodeError> {
        let peer = self.store.apply_local_link_down(port)?;

        let mut flooding = self.flooding();
        flooding.recompute();
        flooding.originate(LinkChange::Remove(peer))
    }

    /// Clock tick; sends a refresh once the heartbeat interval has elapsed
    pub fn on_tick(&mut self, now_ms: u64) -> Result<Option<Advertisement>, NodeError> {
        if now_ms.saturating_sub(self.last_announced_ms) < self.config.heartbeat_interval_ms {
            return Ok(None);
        }

        self.last_announced_ms = now_ms;
        self.flooding().originate(LinkChange::Refresh).map(Some)
    }

    /// Current forwarding table
    pub fn forwarding_table(&self) -> &ForwardingTable {
        &self.table
    }

    /// Topology store
    pub fn topology(&self) -> &TopologyStore {
        &self.store
    }

    /// Node statistics
    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    /// Outbound transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable outbound transport, for harnesses that rewire links
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Human-readable dump of the LSDB, forwarding table, and sequence numbers
    pub fn debug_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "node {}", self.node_id());
        out.push_str(&self.store.render());
        out.push_str(&self.table.render());
        out
    }

    fn flooding(&mut self) -> FloodingEngine<'_, T> {
        FloodingEngine::new(&mut self.store, &mut self.table, &mut self.transport, &mut self.stats)
    }
}
