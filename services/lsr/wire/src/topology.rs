//! Link-state advertisement structures for the wire protocol.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Link cost as carried on the wire. Costs are never negative.
pub type Cost = u32;

/// Identifier of a routing node or a directly attached client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Outgoing interface on the node that owns it. Meaningless to any other node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalPort(pub u32);

impl fmt::Display for LocalPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A link from the advertising node to one neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Port on the advertising node; only the advertiser may dereference it
    pub port: LocalPort,
    /// Cost of the link
    pub cost: Cost,
}

impl LinkRecord {
    /// Create a new link record
    pub fn new(port: u32, cost: Cost) -> Self {
        Self {
            port: LocalPort(port),
            cost,
        }
    }
}

/// Full adjacency of one node: neighbor -> link
pub type Adjacency = BTreeMap<NodeId, LinkRecord>;

/// The local link event that caused an advertisement to be sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "peer", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkChange {
    /// A link to `peer` came up
    Add(NodeId),
    /// The link to `peer` went down
    Remove(NodeId),
    /// Periodic refresh, no link changed
    Refresh,
}

impl fmt::Display for LinkChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkChange::Add(peer) => write!(f, "ADD {}", peer),
            LinkChange::Remove(peer) => write!(f, "REMOVE {}", peer),
            LinkChange::Refresh => write!(f, "REFRESH"),
        }
    }
}

/// Link-state advertisement: the full adjacency of `origin` at send time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    /// Node that originated this advertisement
    pub origin: NodeId,
    /// Sequence number, strictly increasing per origin
    pub sequence: u64,
    /// Link event that triggered the advertisement
    pub change: LinkChange,
    /// Complete current adjacency of the origin
    pub adjacency: Adjacency,
}

impl Advertisement {
    /// Create a new advertisement
    pub fn new(origin: NodeId, sequence: u64, change: LinkChange, adjacency: Adjacency) -> Self {
        Self {
            origin,
            sequence,
            change,
            adjacency,
        }
    }
}
