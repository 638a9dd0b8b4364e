use chord_lib::dht_messages::{DhtRequest, DhtResponse, Envelope, NodeRef};
use chord_lib::{hash, Identifier};
use log::debug;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{NodeError, RpcError};
use crate::network_client::{read_message, NetworkClient, RealNetworkClient, TransportConfig};
use crate::state::{RingState, StateHandle};
use crate::Config;

/// Identifier of the node reachable at `host` and `port`.
pub fn node_identifier(host: &str, port: u16) -> Identifier {
    hash(&format!("{}{}", host, port))
}

#[derive(Debug)]
pub struct ChordNode<T: NetworkClient> {
    pub info: NodeRef,
    pub(crate) state: StateHandle,
    pub network_client: Arc<T>,
}

impl<T: NetworkClient> Clone for ChordNode<T> {
    fn clone(&self) -> Self {
        ChordNode {
            info: self.info,
            state: self.state.clone(),
            network_client: self.network_client.clone(),
        }
    }
}

impl<T: NetworkClient> ChordNode<T> {
    pub async fn new(host: &str, address: SocketAddr, network_client: Arc<T>) -> Self {
        let id = node_identifier(host, address.port());
        Self::new_with_id(id, address, network_client).await
    }

    /// A node with a chosen identifier instead of one derived from its port.
    pub async fn new_with_id(id: Identifier, address: SocketAddr, network_client: Arc<T>) -> Self {
        let info = NodeRef::new(id, address);
        ChordNode {
            info,
            state: StateHandle::spawn(RingState::new(info)),
            network_client,
        }
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    /// Sends `request` to `target`, naming `origin` as the exclusive port.
    pub(crate) async fn call(
        &self,
        target: NodeRef,
        request: DhtRequest,
        origin: Option<u16>,
    ) -> Result<DhtResponse, RpcError> {
        self.network_client
            .call_node(target.address, Envelope::new(request, origin))
            .await
    }

    /// Accepts connections forever, one task per connection.
    pub async fn serve(&self, listener: TcpListener, transport: TransportConfig) {
        log_info!(self.info.address, "Ready and listening for events");
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => {
                    debug!("[{}] Connection from {}", self.info.address, peer);
                    let node = self.clone();
                    tokio::spawn(async move {
                        node.handle_connection(socket, transport).await;
                    });
                }
                Err(e) => {
                    log_error!(self.info.address, "Failed to accept connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(&self, mut socket: TcpStream, transport: TransportConfig) {
        let buffer = match read_message(&mut socket, &transport).await {
            Ok(buffer) => buffer,
            Err(e) => {
                log_error!(self.info.address, "Failed to read from socket: {}", e);
                return;
            }
        };
        if buffer.is_empty() {
            debug!("[{}] Peer closed without sending a request", self.info.address);
            return;
        }

        let response = match bincode::deserialize::<Envelope>(&buffer) {
            Ok(envelope) => {
                log_info!(
                    self.info.address,
                    "Received {} (origin {:?})",
                    envelope.request.method(),
                    envelope.origin
                );
                self.dispatch(envelope).await
            }
            Err(e) => {
                log_error!(self.info.address, "Failed to deserialize message: {}", e);
                DhtResponse::Error {
                    message: format!("malformed request: {}", e),
                }
            }
        };

        let encoded = match bincode::serialize(&response) {
            Ok(encoded) => encoded,
            Err(e) => {
                log_error!(self.info.address, "Failed to encode response: {}", e);
                return;
            }
        };
        if let Err(e) = socket.write_all(&encoded).await {
            log_error!(self.info.address, "Failed to write response to socket: {}", e);
            return;
        }
        if let Err(e) = socket.shutdown().await {
            debug!("[{}] Shutdown error (non-critical): {}", self.info.address, e);
        }
    }
}

impl ChordNode<RealNetworkClient> {
    /// Binds the listening socket and builds the node around the address it
    /// got. Nothing is accepted until [`ChordNode::serve`] runs.
    pub async fn bind(config: &Config) -> Result<(Self, TcpListener), NodeError> {
        let bind_address = SocketAddr::from((config.ip, config.port));
        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|source| NodeError::Bind {
                address: bind_address.to_string(),
                source,
            })?;
        let address = listener.local_addr().map_err(|source| NodeError::Bind {
            address: bind_address.to_string(),
            source,
        })?;

        let client = Arc::new(RealNetworkClient::new(config.transport));
        let node = ChordNode::new(&config.host, address, client).await;
        log_info!(
            node.info.address,
            "Chord node {} bound to port {}",
            node.info.id.short(),
            address.port()
        );
        Ok((node, listener))
    }
}
