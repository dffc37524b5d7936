//! Discrete-time simulation of a network of routers and clients.
//!
//! Each node runs as its own task behind an unbounded inbox. A link is a
//! pair of [`Wire`]s, one per direction, each holding a sender into the far
//! end's inbox and the port the payload arrives on there. The driver
//! advances virtual time in fixed steps, applies scripted link events and
//! probes when they fall due, and ticks every node once per step.

use crate::config::{LinkAction, LinkEvent, ProbeSpec, ResolvedLink, SimConfig};
use crate::{component_debug, component_info};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use lsr_node::{Node, NodeConfig, NodeStats, Transport};
use lsr_topology::TopologyStats;
use lsr_wire::{DataPacket, LocalPort, NodeId, Packet};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, info_span, warn, Instrument};

/// Port used for packets a router originates itself
pub const LOCAL_PORT: LocalPort = LocalPort(0);

/// Wall-clock steps granted after the last tick for in-flight traffic to land
const SETTLE_STEPS: u64 = 10;

/// Input to a node task
#[derive(Debug)]
pub enum SimEvent {
    /// Payload arriving on a local port
    Packet { port: LocalPort, payload: Bytes },
    /// Link to `peer` is up on `port`; `wire` reaches the peer
    LinkUp {
        port: LocalPort,
        peer: NodeId,
        cost: i64,
        wire: Wire,
    },
    /// Link on `port` is down
    LinkDown { port: LocalPort },
    /// Virtual clock advanced
    Tick { now_ms: u64 },
    /// Send a data packet to `dst`
    Probe { dst: NodeId, now_ms: u64 },
    /// Reply with the node's current state
    Report(oneshot::Sender<Report>),
    /// Stop the task
    Shutdown,
}

/// One direction of a link
#[derive(Debug, Clone)]
pub struct Wire {
    inbox: mpsc::UnboundedSender<SimEvent>,
    remote_port: LocalPort,
}

impl Wire {
    fn deliver(&self, payload: Bytes) -> bool {
        self.inbox
            .send(SimEvent::Packet {
                port: self.remote_port,
                payload,
            })
            .is_ok()
    }
}

/// Transport that hands payloads to the wire attached to each port
#[derive(Debug, Default)]
pub struct ChannelTransport {
    wires: HashMap<LocalPort, Wire>,
}

impl ChannelTransport {
    /// Attach `wire` to `port`, returning the wire it replaces
    fn attach(&mut self, port: LocalPort, wire: Wire) -> Option<Wire> {
        self.wires.insert(port, wire)
    }

    fn detach(&mut self, port: LocalPort) {
        self.wires.remove(&port);
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, port: LocalPort, payload: Bytes) {
        match self.wires.get(&port) {
            Some(wire) => {
                if !wire.deliver(payload) {
                    debug!(%port, "peer has stopped, dropping payload");
                }
            }
            None => debug!(%port, "no wire attached, dropping payload"),
        }
    }
}

/// State of one router at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    /// Router identifier
    pub node_id: NodeId,
    /// Next hop for every reachable destination
    pub next_hops: BTreeMap<NodeId, NodeId>,
    /// Protocol counters
    pub stats: NodeStats,
    /// LSDB size and local sequence number
    pub topology: TopologyStats,
    /// Rendered LSDB, sequence table and forwarding table
    pub debug: String,
}

impl NodeReport {
    fn from_node<T: Transport>(node: &Node<T>) -> Self {
        let next_hops = node
            .forwarding_table()
            .routes()
            .iter()
            .map(|(dst, route)| (dst.clone(), route.next_hop.clone()))
            .collect();

        Self {
            node_id: node.node_id().clone(),
            next_hops,
            stats: node.stats().clone(),
            topology: node.topology().stats(),
            debug: node.debug_string(),
        }
    }
}

/// A data packet that reached its destination client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveredPacket {
    /// Sender
    pub src: NodeId,
    /// Routers traversed, in order
    pub trace: Vec<NodeId>,
    /// Virtual time of arrival
    pub received_ms: u64,
}

/// State of one client at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct ClientReport {
    /// Client identifier
    pub node_id: NodeId,
    /// Probes sent
    pub sent: u64,
    /// Packets received
    pub delivered: Vec<DeliveredPacket>,
}

/// Reply to [`SimEvent::Report`]
#[derive(Debug, Clone)]
pub enum Report {
    /// From a router task
    Router(NodeReport),
    /// From a client task
    Client(ClientReport),
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    /// Virtual time the run stopped at
    pub end_time_ms: u64,
    /// Routers, ordered by identifier
    pub routers: Vec<NodeReport>,
    /// Clients, ordered by identifier
    pub clients: Vec<ClientReport>,
}

/// Data packet counts across a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySummary {
    /// Probes sent by clients
    pub client_sent: u64,
    /// Packets received by clients
    pub client_received: u64,
    /// Data packets routers dropped for lack of a route or a routing loop
    pub router_dropped: u64,
}

impl SimReport {
    /// Count data packets sent, received and dropped
    pub fn delivery(&self) -> DeliverySummary {
        DeliverySummary {
            client_sent: self.clients.iter().map(|c| c.sent).sum(),
            client_received: self.clients.iter().map(|c| c.delivered.len() as u64).sum(),
            router_dropped: self.routers.iter().map(|r| r.stats.routing.packets_dropped).sum(),
        }
    }
}

#[cfg(test)]
impl SimReport {
    /// Report for a router
    pub fn router(&self, id: &str) -> Option<&NodeReport> {
        self.routers.iter().find(|r| r.node_id.as_str() == id)
    }

    /// Report for a client
    pub fn client(&self, id: &str) -> Option<&ClientReport> {
        self.clients.iter().find(|c| c.node_id.as_str() == id)
    }
}

async fn run_router(mut node: Node<ChannelTransport>, mut inbox: mpsc::UnboundedReceiver<SimEvent>) {
    while let Some(event) = inbox.recv().await {
        let result = match event {
            SimEvent::Packet { port, payload } => node.handle_payload(port, &payload).map(drop),
            SimEvent::LinkUp { port, peer, cost, wire } => {
                let previous = node.transport_mut().attach(port, wire);
                let result = node.on_link_up(port, peer, cost).map(drop);
                if result.is_err() {
                    // a rejected change leaves the existing link in place
                    match previous {
                        Some(previous) => {
                            node.transport_mut().attach(port, previous);
                        }
                        None => node.transport_mut().detach(port),
                    }
                }
                result
            }
            SimEvent::LinkDown { port } => {
                node.transport_mut().detach(port);
                node.on_link_down(port).map(drop)
            }
            SimEvent::Tick { now_ms } => node.on_tick(now_ms).map(drop),
            SimEvent::Probe { dst, now_ms } => {
                let packet = DataPacket::new(node.node_id().clone(), dst, probe_body(now_ms));
                node.on_data_packet(LOCAL_PORT, packet).map(drop)
            }
            SimEvent::Report(reply) => {
                let _ = reply.send(Report::Router(NodeReport::from_node(&node)));
                Ok(())
            }
            SimEvent::Shutdown => break,
        };

        if let Err(e) = result {
            warn!(error = %e, "event handling failed");
        }
    }
}

/// Terminal node with at most one link
struct Client {
    id: NodeId,
    link: Option<Wire>,
    now_ms: u64,
    sent: u64,
    delivered: Vec<DeliveredPacket>,
}

impl Client {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            link: None,
            now_ms: 0,
            sent: 0,
            delivered: Vec::new(),
        }
    }

    fn receive(&mut self, payload: &[u8]) {
        match lsr_wire::decode(payload) {
            Ok(Packet::Data(packet)) if packet.dst == self.id => {
                info!(src = %packet.src, trace = ?packet.trace, "received data packet");
                self.delivered.push(DeliveredPacket {
                    src: packet.src,
                    trace: packet.trace,
                    received_ms: self.now_ms,
                });
            }
            Ok(Packet::Data(packet)) => {
                debug!(dst = %packet.dst, "ignoring data packet for another node");
            }
            Ok(Packet::Control(_)) => {}
            Err(e) => debug!(error = %e, "dropping malformed payload"),
        }
    }

    fn send_probe(&mut self, dst: NodeId, now_ms: u64) {
        let Some(wire) = &self.link else {
            warn!(%dst, "no link, probe not sent");
            return;
        };

        let packet = DataPacket::new(self.id.clone(), dst, probe_body(now_ms));
        match lsr_wire::encode(&Packet::Data(packet)) {
            Ok(payload) => {
                if wire.deliver(payload) {
                    self.sent += 1;
                }
            }
            Err(e) => warn!(error = %e, "failed to encode probe"),
        }
    }

    fn report(&self) -> ClientReport {
        ClientReport {
            node_id: self.id.clone(),
            sent: self.sent,
            delivered: self.delivered.clone(),
        }
    }
}

async fn run_client(mut client: Client, mut inbox: mpsc::UnboundedReceiver<SimEvent>) {
    while let Some(event) = inbox.recv().await {
        match event {
            SimEvent::Packet { payload, .. } => client.receive(&payload),
            SimEvent::LinkUp { wire, .. } => client.link = Some(wire),
            SimEvent::LinkDown { .. } => client.link = None,
            SimEvent::Tick { now_ms } => client.now_ms = now_ms,
            SimEvent::Probe { dst, now_ms } => client.send_probe(dst, now_ms),
            SimEvent::Report(reply) => {
                let _ = reply.send(Report::Client(client.report()));
            }
            SimEvent::Shutdown => break,
        }
    }
}

fn probe_body(now_ms: u64) -> Bytes {
    Bytes::from(format!("probe@{}ms", now_ms))
}

/// Inboxes of every running node
struct Network {
    inboxes: BTreeMap<NodeId, mpsc::UnboundedSender<SimEvent>>,
    links: Vec<ResolvedLink>,
}

impl Network {
    fn inbox(&self, node: &NodeId) -> Result<&mpsc::UnboundedSender<SimEvent>> {
        self.inboxes
            .get(node)
            .ok_or_else(|| anyhow!("unknown node {}", node))
    }

    fn send(&self, node: &NodeId, event: SimEvent) -> Result<()> {
        self.inbox(node)?
            .send(event)
            .map_err(|_| anyhow!("node {} has stopped", node))
    }

    fn link_up(&self, link: &ResolvedLink, cost: i64) -> Result<()> {
        let (a, b) = (NodeId::from(link.a.as_str()), NodeId::from(link.b.as_str()));
        let (port_a, port_b) = (LocalPort(link.port_a), LocalPort(link.port_b));

        let toward_b = Wire {
            inbox: self.inbox(&b)?.clone(),
            remote_port: port_b,
        };
        let toward_a = Wire {
            inbox: self.inbox(&a)?.clone(),
            remote_port: port_a,
        };

        self.send(
            &a,
            SimEvent::LinkUp {
                port: port_a,
                peer: b.clone(),
                cost,
                wire: toward_b,
            },
        )?;
        self.send(
            &b,
            SimEvent::LinkUp {
                port: port_b,
                peer: a,
                cost,
                wire: toward_a,
            },
        )
    }

    fn link_down(&self, link: &ResolvedLink) -> Result<()> {
        self.send(&NodeId::from(link.a.as_str()), SimEvent::LinkDown { port: LocalPort(link.port_a) })?;
        self.send(&NodeId::from(link.b.as_str()), SimEvent::LinkDown { port: LocalPort(link.port_b) })
    }

    fn apply(&self, event: &LinkEvent) -> Result<()> {
        let link = self
            .links
            .iter()
            .find(|l| (l.a == event.a && l.b == event.b) || (l.a == event.b && l.b == event.a))
            .ok_or_else(|| anyhow!("no link between {} and {}", event.a, event.b))?;

        match event.action {
            LinkAction::Up => {
                component_info!("sim", "t={}ms link {}-{} up, cost {}", event.at_ms, event.a, event.b, event.cost);
                self.link_up(link, event.cost)
            }
            LinkAction::Down => {
                component_info!("sim", "t={}ms link {}-{} down", event.at_ms, event.a, event.b);
                self.link_down(link)
            }
        }
    }

    fn probe(&self, probe: &ProbeSpec, now_ms: u64) -> Result<()> {
        component_debug!("sim", "t={}ms probe {} -> {}", now_ms, probe.from, probe.to);
        self.send(
            &NodeId::from(probe.from.as_str()),
            SimEvent::Probe {
                dst: NodeId::from(probe.to.as_str()),
                now_ms,
            },
        )
    }

    fn tick(&self, now_ms: u64) -> Result<()> {
        for node in self.inboxes.keys() {
            self.send(node, SimEvent::Tick { now_ms })?;
        }
        Ok(())
    }

    async fn collect(&self, end_time_ms: u64) -> Result<SimReport> {
        let mut report = SimReport {
            end_time_ms,
            routers: Vec::new(),
            clients: Vec::new(),
        };

        for node in self.inboxes.keys() {
            let (reply, response) = oneshot::channel();
            self.send(node, SimEvent::Report(reply))?;
            match response.await.map_err(|_| anyhow!("node {} did not report", node))? {
                Report::Router(r) => report.routers.push(r),
                Report::Client(c) => report.clients.push(c),
            }
        }
        Ok(report)
    }

    fn shutdown(&self) {
        for inbox in self.inboxes.values() {
            let _ = inbox.send(SimEvent::Shutdown);
        }
    }
}

/// Run a full simulation and collect every node's final state
pub async fn run(config: &SimConfig) -> Result<SimReport> {
    config.validate()?;
    drive(config).await
}

async fn drive(config: &SimConfig) -> Result<SimReport> {
    let mut inboxes = BTreeMap::new();
    let mut tasks = Vec::new();

    let node_config = NodeConfig::with_heartbeat(config.heartbeat_interval_ms);
    for name in &config.routers {
        let id = NodeId::from(name.as_str());
        let (tx, rx) = mpsc::unbounded_channel();
        let node = Node::new(id.clone(), node_config.clone(), ChannelTransport::default());
        let span = info_span!("router", node = %id);
        tasks.push(tokio::spawn(run_router(node, rx).instrument(span)));
        inboxes.insert(id, tx);
    }
    for name in &config.clients {
        let id = NodeId::from(name.as_str());
        let (tx, rx) = mpsc::unbounded_channel();
        let span = info_span!("client", node = %id);
        tasks.push(tokio::spawn(run_client(Client::new(id.clone()), rx).instrument(span)));
        inboxes.insert(id, tx);
    }

    let network = Network {
        inboxes,
        links: config.resolved_links()?,
    };
    component_info!(
        "sim",
        "started {} routers and {} clients",
        config.routers.len(),
        config.clients.len()
    );

    for link in &network.links {
        network.link_up(link, link.cost)?;
    }

    let mut events: Vec<&LinkEvent> = config.events.iter().collect();
    events.sort_by_key(|e| e.at_ms);
    let mut events = events.into_iter().peekable();

    let mut probes: Vec<&ProbeSpec> = config.probes.iter().collect();
    probes.sort_by_key(|p| p.at_ms);
    let mut probes = probes.into_iter().peekable();

    let wall_tick = Duration::from_millis(config.wall_tick_ms);
    let mut now_ms = 0;
    loop {
        while let Some(event) = events.next_if(|e| e.at_ms <= now_ms) {
            network.apply(event)?;
        }
        while let Some(probe) = probes.next_if(|p| p.at_ms <= now_ms) {
            network.probe(probe, now_ms)?;
        }
        network.tick(now_ms)?;

        if now_ms >= config.end_time_ms {
            break;
        }
        tokio::time::sleep(wall_tick).await;
        now_ms += config.tick_interval_ms;
    }

    tokio::time::sleep(Duration::from_millis(config.wall_tick_ms.max(1) * SETTLE_STEPS)).await;
    let report = network.collect(now_ms).await?;

    network.shutdown();
    for task in tasks {
        task.await?;
    }
    component_info!("sim", "finished at t={}ms", now_ms);

    Ok(report)
}
