#![allow(dead_code)]

use bytes::Bytes;
use lsr_node::{Node, NodeConfig, PacketOutcome, QueueTransport};
use lsr_wire::{DataPacket, LocalPort, NodeId, Packet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub fn node(id: &str) -> NodeId {
    NodeId::from(id)
}

/// A payload in flight toward `to` on its port `port`
pub struct InFlight {
    pub to: NodeId,
    pub port: LocalPort,
    pub payload: Bytes,
}

/// Routers and clients connected by lossless, instantly wired links.
/// Delivery order is controlled by the test.
pub struct VirtualNetwork {
    pub routers: BTreeMap<NodeId, Node<QueueTransport>>,
    pub clients: BTreeSet<NodeId>,
    pub delivered: BTreeMap<NodeId, Vec<DataPacket>>,
    pub in_flight: Vec<InFlight>,
    wiring: HashMap<(NodeId, LocalPort), (NodeId, LocalPort)>,
    next_port: HashMap<NodeId, u32>,
}

impl VirtualNetwork {
    pub fn create(routers: &[&str], clients: &[&str], links: &[(&str, &str, i64)]) -> Self {
        let mut network = VirtualNetwork {
            routers: routers
                .iter()
                .map(|id| (node(id), Node::new(node(id), NodeConfig::with_heartbeat(1000), QueueTransport::new())))
                .collect(),
            clients: clients.iter().map(|id| node(id)).collect(),
            delivered: BTreeMap::new(),
            in_flight: Vec::new(),
            wiring: HashMap::new(),
            next_port: HashMap::new(),
        };
        for (a, b, cost) in links {
            network.connect(a, b, *cost);
        }
        network
    }

    pub fn node(&self, id: &str) -> &Node<QueueTransport> {
        self.routers
            .get(&node(id))
            .unwrap_or_else(|| panic!("No router {id} found"))
    }

    pub fn node_mut(&mut self, id: &str) -> &mut Node<QueueTransport> {
        self.routers
            .get_mut(&node(id))
            .unwrap_or_else(|| panic!("No router {id} found"))
    }

    fn allocate_port(&mut self, id: &NodeId) -> LocalPort {
        let next = self.next_port.entry(id.clone()).or_insert(1);
        let port = LocalPort(*next);
        *next += 1;
        port
    }

    pub fn port_between(&self, a: &str, b: &str) -> Option<LocalPort> {
        self.wiring
            .iter()
            .find(|((from, _), (to, _))| *from == node(a) && *to == node(b))
            .map(|((_, port), _)| *port)
    }

    /// Bring up a link and let both routers react; advertisements are queued, not delivered
    pub fn connect(&mut self, a: &str, b: &str, cost: i64) {
        let (na, nb) = (node(a), node(b));
        let pa = self.allocate_port(&na);
        let pb = self.allocate_port(&nb);
        self.wiring.insert((na.clone(), pa), (nb.clone(), pb));
        self.wiring.insert((nb.clone(), pb), (na.clone(), pa));

        if let Some(router) = self.routers.get_mut(&na) {
            router.on_link_up(pa, nb.clone(), cost).unwrap();
        }
        if let Some(router) = self.routers.get_mut(&nb) {
            router.on_link_up(pb, na.clone(), cost).unwrap();
        }
        self.collect();
    }

    pub fn disconnect(&mut self, a: &str, b: &str) {
        let pa = self.port_between(a, b).expect("link exists");
        let pb = self.port_between(b, a).expect("link exists");
        self.wiring.remove(&(node(a), pa));
        self.wiring.remove(&(node(b), pb));

        if let Some(router) = self.routers.get_mut(&node(a)) {
            router.on_link_down(pa).unwrap();
        }
        if let Some(router) = self.routers.get_mut(&node(b)) {
            router.on_link_down(pb).unwrap();
        }
        self.collect();
    }

    /// Move everything routers have sent onto the wire
    pub fn collect(&mut self) {
        for (id, router) in self.routers.iter_mut() {
            for (port, payload) in router.transport_mut().drain() {
                if let Some((to, to_port)) = self.wiring.get(&(id.clone(), port)) {
                    self.in_flight.push(InFlight {
                        to: to.clone(),
                        port: *to_port,
                        payload,
                    });
                }
            }
        }
    }

    fn deliver(&mut self, item: InFlight) -> Option<PacketOutcome> {
        let outcome = if let Some(router) = self.routers.get_mut(&item.to) {
            Some(router.handle_payload(item.port, &item.payload).unwrap())
        } else {
            if let Ok(Packet::Data(packet)) = lsr_wire::decode(&item.payload) {
                if packet.dst == item.to {
                    self.delivered.entry(item.to.clone()).or_default().push(packet);
                }
            }
            None
        };
        self.collect();
        outcome
    }

    /// Deliver in FIFO order until nothing is in flight
    pub fn run_until_quiet(&mut self) -> usize {
        let mut count = 0;
        while !self.in_flight.is_empty() {
            let item = self.in_flight.remove(0);
            self.deliver(item);
            count += 1;
        }
        count
    }

    /// Deliver in a random order until nothing is in flight
    pub fn run_shuffled(&mut self, seed: u64) -> usize {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut count = 0;
        while !self.in_flight.is_empty() {
            let index = rng.gen_range(0..self.in_flight.len());
            let item = self.in_flight.swap_remove(index);
            self.deliver(item);
            count += 1;
        }
        count
    }

    /// Deliver each in-flight payload twice, in random order
    pub fn run_duplicated(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        while !self.in_flight.is_empty() {
            let index = rng.gen_range(0..self.in_flight.len());
            let item = self.in_flight.swap_remove(index);
            let copy = InFlight {
                to: item.to.clone(),
                port: item.port,
                payload: item.payload.clone(),
            };
            self.deliver(item);
            self.deliver(copy);
        }
    }

    /// Lose everything in flight
    pub fn drop_in_flight(&mut self) -> usize {
        let lost = self.in_flight.len();
        self.in_flight.clear();
        lost
    }

    pub fn tick_all(&mut self, now_ms: u64) {
        for router in self.routers.values_mut() {
            router.on_tick(now_ms).unwrap();
        }
        self.collect();
    }

    /// Inject a data packet at router `at`, as if it arrived from a client on `port`
    pub fn send_data(&mut self, at: &str, src: &str, dst: &str) {
        let payload = lsr_wire::encode(&Packet::Data(DataPacket::new(node(src), node(dst), Bytes::new()))).unwrap();
        self.in_flight.push(InFlight {
            to: node(at),
            port: LocalPort(0),
            payload,
        });
    }

    /// Every router holds every other router's current adjacency
    pub fn assert_converged(&self) {
        for (id, router) in &self.routers {
            for (origin, origin_router) in &self.routers {
                if id == origin {
                    continue;
                }
                assert_eq!(
                    router.topology().snapshot().get(origin),
                    Some(origin_router.topology().local_adjacency()),
                    "{id} has a stale view of {origin}"
                );
            }
        }
    }

    pub fn next_hop(&self, at: &str, dst: &str) -> Option<String> {
        self.node(at)
            .forwarding_table()
            .next_hop(&node(dst))
            .map(|hop| hop.to_string())
    }

    pub fn cost(&self, at: &str, dst: &str) -> Option<u64> {
        self.node(at).forwarding_table().route(&node(dst)).map(|r| r.total_cost)
    }
}
