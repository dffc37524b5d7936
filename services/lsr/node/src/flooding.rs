//! Flooding engine: acceptance and re-broadcast of advertisements.
//!
//! Every advertisement carries the origin's full adjacency, so one accepted
//! copy brings a receiver fully up to date for that origin. Accepted
//! advertisements are re-broadcast to every current neighbor, including the
//! one they arrived from; receivers drop the echo by sequence number.

use crate::error::NodeError;
use crate::stats::NodeStats;
use crate::transport::Transport;
use lsr_routing::ForwardingTable;
use lsr_topology::{Acceptance, TopologyStore};
use lsr_wire::{Advertisement, LinkChange, LocalPort, Packet};
use tracing::{debug, info};

/// Borrowed view of a node's state used to process and emit advertisements
pub struct FloodingEngine<'a, T: Transport> {
    store: &'a mut TopologyStore,
    table: &'a mut ForwardingTable,
    transport: &'a mut T,
    stats: &'a mut NodeStats,
}

impl<'a, T: Transport> FloodingEngine<'a, T> {
    /// Create a flooding engine over a node's state
    pub fn new(
        store: &'a mut TopologyStore,
        table: &'a mut ForwardingTable,
        transport: &'a mut T,
        stats: &'a mut NodeStats,
    ) -> Self {
        Self {
            store,
            table,
            transport,
            stats,
        }
    }

    /// Handle an inbound advertisement.
    ///
    /// Stale copies are dropped without recomputing or re-broadcasting.
    pub fn on_advertisement(
        &mut self,
        from_port: LocalPort,
        advertisement: Advertisement,
    ) -> Result<Acceptance, NodeError> {
        let acceptance = self.store.try_accept(
            &advertisement.origin,
            advertisement.sequence,
            advertisement.adjacency.clone(),
        );

        if acceptance == Acceptance::Stale {
            self.stats.adverts_stale += 1;
            debug!(
                origin = %advertisement.origin,
                sequence = advertisement.sequence,
                port = %from_port,
                "dropping stale advertisement"
            );
            return Ok(acceptance);
        }

        self.stats.adverts_accepted += 1;
        self.recompute();
        let sent = self.broadcast(&Packet::Control(advertisement.clone()))?;
        debug!(
            origin = %advertisement.origin,
            sequence = advertisement.sequence,
            change = %advertisement.change,
            port = %from_port,
            sent,
            "re-flooded advertisement"
        );

        Ok(acceptance)
    }

    /// Originate an advertisement of our full current adjacency
    pub fn originate(&mut self, change: LinkChange) -> Result<Advertisement, NodeError> {
        let sequence = self.store.next_local_sequence();
        let advertisement = Advertisement::new(
            self.store.local_node_id().clone(),
            sequence,
            change,
            self.store.local_adjacency().clone(),
        );

        self.stats.adverts_originated += 1;
        let sent = self.broadcast(&Packet::Control(advertisement.clone()))?;
        info!(
            sequence,
            change = %advertisement.change,
            neighbors = advertisement.adjacency.len(),
            sent,
            "originated advertisement"
        );

        Ok(advertisement)
    }

    /// Rebuild the forwarding table from the current LSDB
    pub fn recompute(&mut self) {
        *self.table = ForwardingTable::compute(self.store.snapshot(), self.store.local_node_id());
    }

    /// Send a packet to every neighbor in our own adjacency
    fn broadcast(&mut self, packet: &Packet) -> Result<usize, NodeError> {
        let payload = lsr_wire::encode(packet)?;

        let mut sent = 0;
        for link in self.store.local_adjacency().values() {
            self.transport.send(link.port, payload.clone());
            sent += 1;
        }

        self.stats.adverts_sent += sent as u64;
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::QueueTransport;
    use lsr_wire::{Adjacency, LinkRecord, NodeId};

    struct Fixture {
        store: TopologyStore,
        table: ForwardingTable,
        transport: QueueTransport,
        stats: NodeStats,
    }

    impl Fixture {
        fn new(id: &str) -> Self {
            Self {
                store: TopologyStore::new(NodeId::from(id)),
                table: ForwardingTable::new(NodeId::from(id)),
                transport: QueueTransport::new(),
                stats: NodeStats::default(),
            }
        }

        fn engine(&mut self) -> FloodingEngine<'_, QueueTransport> {
            FloodingEngine::new(&mut self.store, &mut self.table, &mut self.transport, &mut self.stats)
        }
    }

    fn advert(origin: &str, sequence: u64, links: &[(&str, u32)]) -> Advertisement {
        let adjacency: Adjacency = links
            .iter()
            .map(|(peer, cost)| (NodeId::from(*peer), LinkRecord::new(40, *cost)))
            .collect();
        Advertisement::new(NodeId::from(origin), sequence, LinkChange::Refresh, adjacency)
    }

    #[test]
    fn test_originate_sends_full_adjacency_to_every_neighbor() {
        let mut fx = Fixture::new("A");
        fx.store.apply_local_link_up(NodeId::from("B"), LocalPort(1), 1).unwrap();
        fx.store.apply_local_link_up(NodeId::from("C"), LocalPort(2), 1).unwrap();

        let adv = fx.engine().originate(LinkChange::Add(NodeId::from("C"))).unwrap();
        assert_eq!(adv.sequence, 1);
        assert_eq!(adv.adjacency.len(), 2);

        let ports: Vec<LocalPort> = fx.transport.outbound().iter().map(|(p, _)| *p).collect();
        assert_eq!(ports, vec![LocalPort(1), LocalPort(2)]);
        assert_eq!(fx.stats.adverts_originated, 1);
        assert_eq!(fx.stats.adverts_sent, 2);
    }

    #[test]
    fn test_accepted_advertisement_is_reflooded_including_inbound_port() {
        let mut fx = Fixture::new("A");
        fx.store.apply_local_link_up(NodeId::from("B"), LocalPort(1), 1).unwrap();
        fx.store.apply_local_link_up(NodeId::from("C"), LocalPort(2), 1).unwrap();

        let adv = advert("B", 1, &[("A", 1), ("D", 1)]);
        let acceptance = fx.engine().on_advertisement(LocalPort(1), adv.clone()).unwrap();
        assert_eq!(acceptance, Acceptance::Accepted);

        let sent = fx.transport.drain();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().any(|(port, _)| *port == LocalPort(1)));
        for (_, payload) in &sent {
            assert_eq!(lsr_wire::decode(payload).unwrap(), Packet::Control(adv.clone()));
        }
        assert_eq!(fx.table.next_hop(&NodeId::from("D")), Some(&NodeId::from("B")));
    }

    #[test]
    fn test_stale_advertisement_is_absorbed() {
        let mut fx = Fixture::new("A");
        fx.store.apply_local_link_up(NodeId::from("B"), LocalPort(1), 1).unwrap();

        fx.engine().on_advertisement(LocalPort(1), advert("B", 2, &[("A", 1)])).unwrap();
        fx.transport.drain();
        let table_before = fx.table.clone();

        let acceptance = fx
            .engine()
            .on_advertisement(LocalPort(1), advert("B", 1, &[("A", 1), ("Z", 1)]))
            .unwrap();
        assert_eq!(acceptance, Acceptance::Stale);
        assert!(fx.transport.outbound().is_empty());
        assert_eq!(fx.table, table_before);
        assert_eq!(fx.stats.adverts_stale, 1);
    }
}
