//! Chord DHT node library
//!
//! A node joins a Chord ring, keeps its finger table current as others join,
//! and answers lookups and record queries for its shard of a bulk dataset.
//! It runs as the `chord_node` binary and is also used directly by the
//! integration tests.

macro_rules! log_info {
    ($address:expr, $($arg:tt)*) => ({
        log::info!("[{}] {}", $address, format_args!($($arg)*));
    })
}

macro_rules! log_error {
    ($address:expr, $($arg:tt)*) => ({
        log::error!("[{}] {}", $address, format_args!($($arg)*));
    })
}

pub mod dispatcher;
pub mod error;
pub mod finger_table;
pub mod join;
pub mod lookup;
pub mod network_client;
pub mod node;
pub mod shard;
pub mod state;


use std::net::{Ipv4Addr, SocketAddr};

pub use error::{NodeError, RpcError};
pub use network_client::{NetworkClient, RealNetworkClient, TransportConfig};
pub use node::{node_identifier, ChordNode};

pub use chord_lib::dht_messages::{
    DhtRequest, DhtResponse, Direction, Envelope, NodeRef, NodeSnapshot, SuccessorLink,
};
pub use chord_lib::Identifier;

/// Configuration for a ChordNode
#[derive(Debug, Clone)]
pub struct Config {
    /// Host name hashed together with the port into the node identifier.
    pub host: String,
    pub ip: Ipv4Addr,
    /// 0 binds an ephemeral port.
    pub port: u16,
    /// Port of a node already in the ring; `None` starts a new ring.
    pub bootstrap_port: Option<u16>,
    pub transport: TransportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            ip: Ipv4Addr::LOCALHOST,
            port: 0,
            bootstrap_port: None,
            transport: TransportConfig::default(),
        }
    }
}

impl Config {
    pub fn bootstrap_address(&self) -> Option<SocketAddr> {
        self.bootstrap_port
            .map(|port| SocketAddr::from((self.ip, port)))
    }
}

/// Binds, joins, then serves until the process ends.
pub async fn start(config: Config) -> Result<(), NodeError> {
    let (node, listener) = ChordNode::bind(&config).await?;
    node.join(config.bootstrap_address()).await?;
    node.serve(listener, config.transport).await;
    Ok(())
}
