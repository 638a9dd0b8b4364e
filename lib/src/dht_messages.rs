use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use crate::{is_between, Identifier};

/// Identifier and address of a node, captured at one point in time.
///
/// A `NodeRef` is a copy, never a live view: the node it names may have moved
/// its own pointers by the time the value is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: Identifier,
    pub address: SocketAddr,
}

impl NodeRef {
    pub fn new(id: Identifier, address: SocketAddr) -> Self {
        Self { id, address }
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    /// Whether this node is the origin named by an RPC's exclusive port.
    pub fn is_origin(&self, origin: Option<u16>) -> bool {
        origin == Some(self.port())
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.id.short())
    }
}

/// A node together with its successor and predecessor as that node saw them
/// when it answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node: NodeRef,
    pub successor: NodeRef,
    pub predecessor: NodeRef,
}

impl NodeSnapshot {
    /// A lone node: both neighbours are the node itself.
    pub fn solo(node: NodeRef) -> Self {
        Self {
            node,
            successor: node,
            predecessor: node,
        }
    }

    pub fn link(&self) -> SuccessorLink {
        SuccessorLink {
            node: self.node,
            successor: self.successor,
        }
    }
}

/// A node and the successor it reported. This is the answer to
/// `FindPredecessor`: the successor half is what `FindSuccessor` hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessorLink {
    pub node: NodeRef,
    pub successor: NodeRef,
}

impl SuccessorLink {
    /// True when `id` falls in `(node, successor]`, i.e. `node` is the
    /// predecessor of `id`.
    pub fn precedes(&self, id: &Identifier) -> bool {
        is_between(id, &self.node.id, &self.successor.id)
    }
}

/// One row of the bulk dataset minus its key columns.
pub type Record = Vec<String>;

/// Hashed record key to every record filed under it.
pub type Dataset = BTreeMap<Identifier, Vec<Record>>;

/// Which way a flooded request is travelling around the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Entry point: relay both ways.
    Both,
    TowardPredecessor,
    TowardSuccessor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DhtRequest {
    // Find the node responsible for `id`
    FindSuccessor {
        id: Identifier,
    },
    // Find the node whose successor is responsible for `id`
    FindPredecessor {
        id: Identifier,
    },
    // Find the node with the lowest identifier on the ring
    FindLowestNode,
    // Offer a node as the receiver's successor
    UpdateSuccessor {
        candidate: NodeRef,
    },
    // Tell the receiver that `candidate` is its predecessor
    UpdatePredecessor {
        candidate: NodeRef,
    },
    // Tell the receiver that `node` may be its `index`-th finger (1-based)
    UpdateFinger {
        node: NodeRef,
        index: usize,
    },
    // Flood a dataset around the ring; every node keeps what it owns
    Populate {
        dataset: Dataset,
        direction: Direction,
    },
    // Search the ring for the records filed under `id`
    FindKey {
        id: Identifier,
        direction: Direction,
    },
    // Ask a node for its current successor and predecessor
    GetNeighbors,
}

impl DhtRequest {
    pub fn method(&self) -> &'static str {
        match self {
            DhtRequest::FindSuccessor { .. } => "FindSuccessor",
            DhtRequest::FindPredecessor { .. } => "FindPredecessor",
            DhtRequest::FindLowestNode => "FindLowestNode",
            DhtRequest::UpdateSuccessor { .. } => "UpdateSuccessor",
            DhtRequest::UpdatePredecessor { .. } => "UpdatePredecessor",
            DhtRequest::UpdateFinger { .. } => "UpdateFinger",
            DhtRequest::Populate { .. } => "Populate",
            DhtRequest::FindKey { .. } => "FindKey",
            DhtRequest::GetNeighbors => "GetNeighbors",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DhtResponse {
    Node(NodeRef),
    Snapshot(NodeSnapshot),
    // `None` when the responder could not locate a predecessor
    Link(Option<SuccessorLink>),
    // Acknowledgement carrying the responder
    Ack(NodeRef),
    // `None` when no node holds the key
    Records(Option<Vec<Record>>),
    // The responder has not finished joining the ring
    NotReady,
    Error {
        message: String,
    },
}

/// A request plus the exclusive port of the call's origin.
///
/// `origin == None` marks an external caller (the `-1` port of the classic
/// protocol). Handlers never send a nested request to the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub request: DhtRequest,
    pub origin: Option<u16>,
}

impl Envelope {
    pub fn new(request: DhtRequest, origin: Option<u16>) -> Self {
        Self { request, origin }
    }

    pub fn external(request: DhtRequest) -> Self {
        Self::new(request, None)
    }
}
