//! Error types for the node and its transport.

use std::net::SocketAddr;

use chord_lib::dht_messages::DhtResponse;

/// Failure of a single outbound call.
///
/// `NoResponse` is the "peer unavailable" outcome: the connection was refused
/// or the peer closed without sending anything. Callers fall back to local
/// state on any of these; none is ever retried.
#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("no response from {address}")]
    NoResponse { address: SocketAddr },

    #[error("{operation} to {address} timed out")]
    Timeout {
        operation: &'static str,
        address: SocketAddr,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to encode or decode message: {0}")]
    Encode(#[from] bincode::Error),

    #[error("peer reported an error: {0}")]
    Remote(String),

    #[error("peer has not finished joining the ring")]
    NotReady,

    #[error("unexpected response to {method}: {response:?}")]
    UnexpectedResponse {
        method: &'static str,
        response: Box<DhtResponse>,
    },
}

impl RpcError {
    pub fn unexpected(method: &'static str, response: DhtResponse) -> Self {
        match response {
            DhtResponse::Error { message } => RpcError::Remote(message),
            DhtResponse::NotReady => RpcError::NotReady,
            other => RpcError::UnexpectedResponse {
                method,
                response: Box::new(other),
            },
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum NodeError {
    /// The task owning the node state has stopped.
    #[error("node state is no longer available")]
    StateUnavailable,

    #[error("failed to bind listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not join through {address}: {source}")]
    Bootstrap {
        address: SocketAddr,
        #[source]
        source: RpcError,
    },

    #[error("finger index {index} is outside 1..={max}", max = chord_lib::M)]
    FingerIndex { index: usize },

    #[error(transparent)]
    Rpc(#[from] RpcError),
}
