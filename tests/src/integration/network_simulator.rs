use async_trait::async_trait;
use chord_lib::dht_messages::{DhtResponse, Envelope};
use chord_node::{NetworkClient, RpcError};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Simulates network communication between nodes in the test environment
/// Routes envelopes between nodes without actual TCP connections
#[derive(Clone)]
pub struct NetworkSimulator {
    /// Maps node addresses to message channels
    nodes: Arc<RwLock<HashMap<SocketAddr, mpsc::UnboundedSender<SimulatorMessage>>>>,
    /// Controls message delivery timing and failures
    delivery_controller: Arc<RwLock<DeliveryController>>,
    /// Every request delivered so far
    delivered: Arc<AtomicU64>,
}

/// A request on its way to a simulated node
#[derive(Debug)]
pub struct SimulatorMessage {
    pub envelope: Envelope,
    pub response_sender: oneshot::Sender<DhtResponse>,
}

#[derive(Default)]
struct DeliveryController {
    /// Addresses that should fail message delivery
    failed_nodes: HashSet<SocketAddr>,
    /// Simulated network latency in milliseconds
    latency_ms: u64,
    /// Drop rate for messages (0.0 to 1.0)
    drop_rate: f64,
}

impl Default for NetworkSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkSimulator {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
            delivery_controller: Arc::new(RwLock::new(DeliveryController::default())),
            delivered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a node with the simulator
    pub async fn register_node(
        &self,
        address: SocketAddr,
        sender: mpsc::UnboundedSender<SimulatorMessage>,
    ) {
        self.nodes.write().await.insert(address, sender);
    }

    /// Mark a node as failed (messages will not be delivered)
    pub async fn mark_node_failed(&self, address: SocketAddr) {
        self.delivery_controller
            .write()
            .await
            .failed_nodes
            .insert(address);
    }

    pub async fn mark_node_recovered(&self, address: &SocketAddr) {
        self.delivery_controller
            .write()
            .await
            .failed_nodes
            .remove(address);
    }

    pub async fn set_latency(&self, latency_ms: u64) {
        self.delivery_controller.write().await.latency_ms = latency_ms;
    }

    /// Set message drop rate (0.0 = no drops, 1.0 = drop all)
    pub async fn set_drop_rate(&self, drop_rate: f64) {
        self.delivery_controller.write().await.drop_rate = drop_rate.clamp(0.0, 1.0);
    }

    pub async fn is_node_registered(&self, address: &SocketAddr) -> bool {
        self.nodes.read().await.contains_key(address)
    }

    /// Number of requests handed to a node so far
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Create a NetworkClient that sends on behalf of `from_address`
    pub fn create_client(&self, from_address: SocketAddr) -> SimulatedNetworkClient {
        SimulatedNetworkClient {
            simulator: self.clone(),
            from_address,
        }
    }
}

/// NetworkClient implementation that uses the simulator for message delivery
#[derive(Clone)]
pub struct SimulatedNetworkClient {
    simulator: NetworkSimulator,
    from_address: SocketAddr,
}

#[async_trait]
impl NetworkClient for SimulatedNetworkClient {
    async fn call_node(
        &self,
        address: SocketAddr,
        envelope: Envelope,
    ) -> Result<DhtResponse, RpcError> {
        let controller = self.simulator.delivery_controller.read().await;

        // Failed and unknown nodes look the same as a refused connection.
        // A failed node is cut off in both directions.
        if controller.failed_nodes.contains(&address)
            || controller.failed_nodes.contains(&self.from_address)
        {
            return Err(RpcError::NoResponse { address });
        }

        if controller.drop_rate > 0.0 && rand::random::<f64>() < controller.drop_rate {
            return Err(RpcError::NoResponse { address });
        }

        if controller.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(controller.latency_ms)).await;
        }
        drop(controller);

        let sender = self
            .simulator
            .nodes
            .read()
            .await
            .get(&address)
            .cloned()
            .ok_or(RpcError::NoResponse { address })?;

        let (response_sender, response_receiver) = oneshot::channel();
        sender
            .send(SimulatorMessage {
                envelope,
                response_sender,
            })
            .map_err(|_| RpcError::NoResponse { address })?;
        self.simulator.delivered.fetch_add(1, Ordering::SeqCst);

        match tokio::time::timeout(Duration::from_secs(30), response_receiver).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(RpcError::NoResponse { address }),
            Err(_) => Err(RpcError::Timeout {
                operation: "simulated request",
                address,
            }),
        }
    }
}
