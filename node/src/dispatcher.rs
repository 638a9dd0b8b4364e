use chord_lib::dht_messages::{DhtRequest, DhtResponse, Envelope};

use crate::error::NodeError;
use crate::network_client::NetworkClient;
use crate::node::ChordNode;

impl<T: NetworkClient> ChordNode<T> {
    /// Answers one inbound request. Until the node has joined, every request
    /// gets `NotReady`.
    pub async fn dispatch(&self, envelope: Envelope) -> DhtResponse {
        let method = envelope.request.method();
        match self.state.with(|state| state.is_joined()).await {
            Ok(true) => {}
            Ok(false) => {
                log_info!(self.info.address, "Rejecting {} before join completed", method);
                return DhtResponse::NotReady;
            }
            Err(e) => {
                return DhtResponse::Error {
                    message: e.to_string(),
                }
            }
        }

        match self.route(envelope.request, envelope.origin).await {
            Ok(response) => response,
            Err(e) => {
                log_error!(self.info.address, "{} failed: {}", method, e);
                DhtResponse::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn route(
        &self,
        request: DhtRequest,
        origin: Option<u16>,
    ) -> Result<DhtResponse, NodeError> {
        let response = match request {
            DhtRequest::FindSuccessor { id } => {
                DhtResponse::Node(self.find_successor(id, origin).await?)
            }
            DhtRequest::FindPredecessor { id } => {
                DhtResponse::Link(self.find_predecessor(id, origin).await?)
            }
            DhtRequest::FindLowestNode => DhtResponse::Node(self.find_lowest_node(origin).await?),
            DhtRequest::UpdateSuccessor { candidate } => {
                DhtResponse::Snapshot(self.update_successor(candidate).await?)
            }
            DhtRequest::UpdatePredecessor { candidate } => {
                DhtResponse::Snapshot(self.update_predecessor(candidate).await?)
            }
            DhtRequest::UpdateFinger { node, index } => {
                DhtResponse::Ack(self.update_finger_table(node, index, origin).await?)
            }
            DhtRequest::Populate { dataset, direction } => {
                DhtResponse::Ack(self.populate(dataset, direction, origin).await?)
            }
            DhtRequest::FindKey { id, direction } => {
                DhtResponse::Records(self.find_record(id, direction, origin).await?)
            }
            DhtRequest::GetNeighbors => DhtResponse::Snapshot(self.get_neighbors().await?),
        };
        Ok(response)
    }
}
