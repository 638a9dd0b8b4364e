//! Routing: locating the node responsible for an identifier.
//!
//! Every operation takes the exclusive port of the request that caused it.
//! A node never sends a nested request to that port, which keeps a lookup
//! from calling back into the node still waiting on it.

use chord_lib::dht_messages::{DhtRequest, DhtResponse, NodeRef, SuccessorLink};
use chord_lib::{is_between, Identifier};
use log::debug;

use crate::error::{NodeError, RpcError};
use crate::network_client::NetworkClient;
use crate::node::ChordNode;

impl<T: NetworkClient> ChordNode<T> {
    /// The node responsible for `id`. When routing finds no predecessor the
    /// lowest node on the ring is the answer, since `id` then wraps past
    /// the top of the identifier space.
    pub async fn find_successor(
        &self,
        id: Identifier,
        origin: Option<u16>,
    ) -> Result<NodeRef, NodeError> {
        match self.find_predecessor(id, origin).await? {
            Some(link) => Ok(link.successor),
            None => {
                debug!(
                    "[{}] No predecessor for {}; using the lowest node",
                    self.info.address,
                    id.short()
                );
                self.find_lowest_node(origin).await
            }
        }
    }

    /// The node whose successor interval `(node, successor]` holds `id`,
    /// or `None` if routing could not get there.
    pub async fn find_predecessor(
        &self,
        id: Identifier,
        origin: Option<u16>,
    ) -> Result<Option<SuccessorLink>, NodeError> {
        let (snapshot, closest) = self
            .state
            .with(move |state| (state.snapshot(), state.closest_preceding_finger(&id, origin)))
            .await?;
        let me = snapshot.node;

        if snapshot.link().precedes(&id) {
            return Ok(Some(snapshot.link()));
        }

        // `id` is ours, so its predecessor is behind us
        let predecessor = snapshot.predecessor;
        if predecessor.id != me.id && is_between(&id, &predecessor.id, &me.id) {
            if !predecessor.is_origin(origin) {
                match self.remote_find_predecessor(predecessor, id, origin).await {
                    Some(link) if link.precedes(&id) => return Ok(Some(link)),
                    Some(link) => debug!(
                        "[{}] Ignoring {} from predecessor: does not cover {}",
                        self.info.address,
                        link.node,
                        id.short()
                    ),
                    None => {}
                }
            }
            return Ok(Some(SuccessorLink {
                node: predecessor,
                successor: me,
            }));
        }

        let Some(next) = closest else {
            return Ok(None);
        };
        if next.id == me.id {
            return Ok(None);
        }
        debug!(
            "[{}] Forwarding predecessor lookup for {} to {}",
            self.info.address,
            id.short(),
            next
        );
        match self.remote_find_predecessor(next, id, origin).await {
            Some(link) if link.precedes(&id) => Ok(Some(link)),
            _ => Ok(None),
        }
    }

    /// Highest finger strictly between this node and `id`, skipping the
    /// origin. Falls back to this node.
    pub async fn closest_preceding_finger(
        &self,
        id: Identifier,
        origin: Option<u16>,
    ) -> Result<NodeRef, NodeError> {
        let me = self.info;
        self.state
            .with(move |state| state.closest_preceding_finger(&id, origin).unwrap_or(me))
            .await
    }

    /// Walks predecessors back to the wrap point: a node whose predecessor
    /// has a larger identifier is the lowest one.
    pub async fn find_lowest_node(&self, origin: Option<u16>) -> Result<NodeRef, NodeError> {
        let predecessor = self.state.with(|state| state.predecessor()).await?;
        if predecessor.id == self.info.id
            || predecessor.id > self.info.id
            || predecessor.is_origin(origin)
        {
            return Ok(self.info);
        }

        match self.call(predecessor, DhtRequest::FindLowestNode, origin).await {
            Ok(DhtResponse::Node(node)) => Ok(node),
            Ok(other) => {
                let e = RpcError::unexpected("FindLowestNode", other);
                log_error!(self.info.address, "Failed to find lowest node: {}", e);
                Ok(self.info)
            }
            Err(e) => {
                log_error!(
                    self.info.address,
                    "Failed to ask {} for the lowest node: {}",
                    predecessor,
                    e
                );
                Ok(self.info)
            }
        }
    }

    async fn remote_find_predecessor(
        &self,
        target: NodeRef,
        id: Identifier,
        origin: Option<u16>,
    ) -> Option<SuccessorLink> {
        match self.call(target, DhtRequest::FindPredecessor { id }, origin).await {
            Ok(DhtResponse::Link(link)) => link,
            Ok(other) => {
                let e = RpcError::unexpected("FindPredecessor", other);
                log_error!(self.info.address, "Bad predecessor reply from {}: {}", target, e);
                None
            }
            Err(e) => {
                log_error!(
                    self.info.address,
                    "Failed to get predecessor of {} from {}: {}",
                    id.short(),
                    target,
                    e
                );
                None
            }
        }
    }
}
