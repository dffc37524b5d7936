//! Packet envelope distinguishing data payloads from control payloads.

use crate::topology::{Advertisement, NodeId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A data packet routed hop by hop toward `dst`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPacket {
    /// Node that sent the packet
    pub src: NodeId,
    /// Final destination
    pub dst: NodeId,
    /// Routers that handled the packet, in order
    pub trace: Vec<NodeId>,
    /// Opaque payload
    pub body: Bytes,
}

impl DataPacket {
    /// Create a new data packet with an empty trace
    pub fn new(src: NodeId, dst: NodeId, body: Bytes) -> Self {
        Self {
            src,
            dst,
            trace: Vec::new(),
            body,
        }
    }

    /// Record that `node` handled this packet
    pub fn record_hop(&mut self, node: &NodeId) {
        self.trace.push(node.clone());
    }
}

/// Anything a node can receive on a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Data to be forwarded or delivered
    Data(DataPacket),
    /// Link-state advertisement
    Control(Advertisement),
}
