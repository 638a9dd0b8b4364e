//! Joining a ring and the handlers other nodes use to splice us in.

use chord_lib::dht_messages::{DhtRequest, DhtResponse, Envelope, NodeRef, NodeSnapshot};
use chord_lib::{in_interval, is_between, ring_pred_point, Identifier, Interval, M};
use log::debug;
use std::net::SocketAddr;

use crate::error::{NodeError, RpcError};
use crate::network_client::NetworkClient;
use crate::node::ChordNode;

impl<T: NetworkClient> ChordNode<T> {
    /// Starts a new ring when `bootstrap` is `None`, otherwise joins the
    /// ring the node at `bootstrap` belongs to. The node answers requests
    /// only after this returns.
    pub async fn join(&self, bootstrap: Option<SocketAddr>) -> Result<(), NodeError> {
        log_info!(
            self.info.address,
            "Joining network with id {} ({})",
            self.info.id,
            self.info.id.to_biguint()
        );
        match bootstrap {
            Some(address) => {
                log_info!(
                    self.info.address,
                    "Attempting to join network via bootstrap node: {}",
                    address
                );
                self.join_via(address).await?;
            }
            None => {
                log_info!(
                    self.info.address,
                    "No bootstrap node provided. Starting a new network."
                );
                self.start_new_network().await?;
            }
        }

        let snapshot = self
            .state
            .with(|state| {
                state.mark_joined();
                state.snapshot()
            })
            .await?;
        log_info!(
            self.info.address,
            "Joined. Successor: {}, predecessor: {}",
            snapshot.successor,
            snapshot.predecessor
        );
        Ok(())
    }

    async fn start_new_network(&self) -> Result<(), NodeError> {
        self.state.with(|state| state.init_solo()).await?;
        log_info!(self.info.address, "Started new network. I am the only node.");
        Ok(())
    }

    async fn join_via(&self, known: SocketAddr) -> Result<(), NodeError> {
        let origin = Some(self.info.port());
        self.init_finger_table(known, origin).await?;

        let predecessor = self.state.with(|state| state.predecessor()).await?;
        if predecessor.id != self.info.id {
            self.update_others(known, origin).await?;
        }
        Ok(())
    }

    async fn ask_known(
        &self,
        known: SocketAddr,
        request: DhtRequest,
        origin: Option<u16>,
    ) -> Result<DhtResponse, RpcError> {
        self.network_client
            .call_node(known, Envelope::new(request, origin))
            .await
    }

    /// Finds our successor through `known`, splices us in between it and
    /// its predecessor, then fills the rest of the finger table.
    async fn init_finger_table(&self, known: SocketAddr, origin: Option<u16>) -> Result<(), NodeError> {
        let me = self.info;
        let successor = match self
            .ask_known(known, DhtRequest::FindSuccessor { id: me.id }, origin)
            .await
        {
            Ok(DhtResponse::Node(node)) => node,
            Ok(other) => {
                return Err(NodeError::Bootstrap {
                    address: known,
                    source: RpcError::unexpected("FindSuccessor", other),
                })
            }
            Err(source) => return Err(NodeError::Bootstrap { address: known, source }),
        };

        if successor.id == me.id {
            // Someone already sits on our identifier
            log_error!(
                self.info.address,
                "{} already holds our identifier; keeping ourselves as successor",
                successor
            );
            self.state
                .with(move |state| {
                    state.fingers_mut().reset(me);
                    state.set_predecessor(successor);
                    state.set_successor(me);
                })
                .await?;
            if let Err(e) = self
                .call(successor, DhtRequest::UpdateSuccessor { candidate: me }, origin)
                .await
            {
                log_error!(self.info.address, "Failed to update successor of {}: {}", successor, e);
            }
            return Ok(());
        }

        let neighbours = match self.call(successor, DhtRequest::GetNeighbors, origin).await {
            Ok(DhtResponse::Snapshot(snapshot)) => snapshot,
            Ok(other) => {
                return Err(NodeError::Bootstrap {
                    address: successor.address,
                    source: RpcError::unexpected("GetNeighbors", other),
                })
            }
            Err(source) => {
                return Err(NodeError::Bootstrap {
                    address: successor.address,
                    source,
                })
            }
        };
        // A lone successor is also our predecessor
        let predecessor = if neighbours.predecessor.id == successor.id {
            successor
        } else {
            neighbours.predecessor
        };

        self.state
            .with(move |state| {
                state.set_successor(successor);
                state.set_predecessor(predecessor);
            })
            .await?;
        log_info!(
            self.info.address,
            "Placed between {} and {}",
            predecessor,
            successor
        );

        match self
            .call(successor, DhtRequest::UpdatePredecessor { candidate: me }, origin)
            .await
        {
            Ok(DhtResponse::Snapshot(snapshot)) => debug!("Successor now reports {:?}", snapshot),
            Ok(other) => log_error!(
                self.info.address,
                "Failed to update predecessor of {}: {}",
                successor,
                RpcError::unexpected("UpdatePredecessor", other)
            ),
            Err(e) => log_error!(
                self.info.address,
                "Failed to update predecessor of {}: {}",
                successor,
                e
            ),
        }
        if predecessor.id != successor.id {
            match self
                .call(predecessor, DhtRequest::UpdateSuccessor { candidate: me }, origin)
                .await
            {
                Ok(DhtResponse::Snapshot(snapshot)) => {
                    debug!("Predecessor now reports {:?}", snapshot)
                }
                Ok(other) => log_error!(
                    self.info.address,
                    "Failed to update successor of {}: {}",
                    predecessor,
                    RpcError::unexpected("UpdateSuccessor", other)
                ),
                Err(e) => log_error!(
                    self.info.address,
                    "Failed to update successor of {}: {}",
                    predecessor,
                    e
                ),
            }
        }

        self.fill_fingers(known, origin).await
    }

    /// Fingers 2..=M. An entry reuses the previous finger when that finger
    /// already covers the next start, and is this node when the start falls
    /// in our own interval. Anything else is looked up through `known`.
    async fn fill_fingers(&self, known: SocketAddr, origin: Option<u16>) -> Result<(), NodeError> {
        let me = self.info;
        for i in 1..M {
            let (previous, next_start, predecessor, successor) = self
                .state
                .with(move |state| {
                    (
                        state.fingers().get(i),
                        state.fingers().start(i + 1),
                        state.predecessor(),
                        state.successor(),
                    )
                })
                .await?;
            let (Some(previous), Some(next_start)) = (previous, next_start) else {
                break;
            };

            let entry = if in_interval(&me.id, &next_start, &previous.id, Interval::LeftClosed) {
                previous
            } else if is_between(&next_start, &predecessor.id, &me.id) {
                me
            } else if is_between(&next_start, &me.id, &successor.id) {
                // Routing through the ring would have to come back to us
                successor
            } else {
                self.lookup_through(known, next_start, origin)
                    .await
                    .unwrap_or(successor)
            };
            self.state
                .with(move |state| state.fingers_mut().set(i + 1, entry))
                .await?;
        }
        Ok(())
    }

    async fn lookup_through(
        &self,
        known: SocketAddr,
        id: Identifier,
        origin: Option<u16>,
    ) -> Option<NodeRef> {
        match self.ask_known(known, DhtRequest::FindSuccessor { id }, origin).await {
            Ok(DhtResponse::Node(node)) => Some(node),
            Ok(other) => {
                log_error!(
                    self.info.address,
                    "Finger lookup for {} failed: {}",
                    id.short(),
                    RpcError::unexpected("FindSuccessor", other)
                );
                None
            }
            Err(e) => {
                log_error!(self.info.address, "Finger lookup for {} failed: {}", id.short(), e);
                None
            }
        }
    }

    /// Tells every node that might now use us as its i-th finger. The
    /// candidate for finger i is the predecessor of `self - 2^(i-1)`, or
    /// the node sitting exactly on that point.
    async fn update_others(&self, known: SocketAddr, origin: Option<u16>) -> Result<(), NodeError> {
        let me = self.info;
        let mut notified = 0usize;
        for i in 1..=M {
            let point = ring_pred_point(&me.id, i);
            let target = match self
                .ask_known(known, DhtRequest::FindPredecessor { id: point }, origin)
                .await
            {
                Ok(DhtResponse::Link(Some(link))) => {
                    if link.successor.id == point {
                        link.successor
                    } else {
                        link.node
                    }
                }
                Ok(DhtResponse::Link(None)) => {
                    debug!("[{}] No predecessor found for finger {}", me.address, i);
                    continue;
                }
                Ok(other) => {
                    log_error!(
                        me.address,
                        "Predecessor lookup for finger {} failed: {}",
                        i,
                        RpcError::unexpected("FindPredecessor", other)
                    );
                    continue;
                }
                Err(e) => {
                    log_error!(me.address, "Predecessor lookup for finger {} failed: {}", i, e);
                    continue;
                }
            };
            if target.id == me.id {
                continue;
            }

            match self
                .call(target, DhtRequest::UpdateFinger { node: me, index: i }, origin)
                .await
            {
                Ok(DhtResponse::Ack(_)) => notified += 1,
                Ok(other) => log_error!(
                    me.address,
                    "Failed to update finger {} of {}: {}",
                    i,
                    target,
                    RpcError::unexpected("UpdateFinger", other)
                ),
                Err(e) => log_error!(me.address, "Failed to update finger {} of {}: {}", i, target, e),
            }
        }
        debug!("[{}] Sent {} finger updates", me.address, notified);
        Ok(())
    }

    /// Takes `node` as finger `index` if it fits better, then passes the
    /// offer back to our predecessor, which may want it too.
    pub async fn update_finger_table(
        &self,
        node: NodeRef,
        index: usize,
        origin: Option<u16>,
    ) -> Result<NodeRef, NodeError> {
        if !(1..=M).contains(&index) {
            return Err(NodeError::FingerIndex { index });
        }
        let (updated, predecessor) = self
            .state
            .with(move |state| (state.update_finger(node, index), state.predecessor()))
            .await?;
        if updated {
            log_info!(self.info.address, "Finger {} is now {}", index, node);
        }

        if predecessor.id != self.info.id
            && predecessor.id != node.id
            && !predecessor.is_origin(origin)
        {
            match self
                .call(predecessor, DhtRequest::UpdateFinger { node, index }, origin)
                .await
            {
                Ok(DhtResponse::Ack(_)) => {}
                Ok(other) => log_error!(
                    self.info.address,
                    "Failed to pass finger {} to {}: {}",
                    index,
                    predecessor,
                    RpcError::unexpected("UpdateFinger", other)
                ),
                Err(e) => log_error!(
                    self.info.address,
                    "Failed to pass finger {} to {}: {}",
                    index,
                    predecessor,
                    e
                ),
            }
        }
        Ok(self.info)
    }

    pub async fn update_successor(&self, candidate: NodeRef) -> Result<NodeSnapshot, NodeError> {
        let (accepted, snapshot) = self
            .state
            .with(move |state| (state.offer_successor(candidate), state.snapshot()))
            .await?;
        if accepted {
            log_info!(self.info.address, "Successor is now {}", candidate);
        }
        Ok(snapshot)
    }

    pub async fn update_predecessor(&self, candidate: NodeRef) -> Result<NodeSnapshot, NodeError> {
        let snapshot = self
            .state
            .with(move |state| {
                state.accept_predecessor(candidate);
                state.snapshot()
            })
            .await?;
        log_info!(self.info.address, "Predecessor is now {}", snapshot.predecessor);
        Ok(snapshot)
    }

    pub async fn get_neighbors(&self) -> Result<NodeSnapshot, NodeError> {
        self.state.snapshot().await
    }
}
