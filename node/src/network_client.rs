use async_trait::async_trait;
use log::{debug, error};
use std::net::SocketAddr;
use std::time::Duration;
use chord_lib::dht_messages::{DhtResponse, Envelope};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::RpcError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkClient: Send + Sync + 'static {
    /// Sends one request and waits for its reply. Every call uses a fresh
    /// connection.
    async fn call_node(
        &self,
        address: SocketAddr,
        envelope: Envelope,
    ) -> Result<DhtResponse, RpcError>;
}

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// How long to wait for the first byte of a message. Nested lookups on
    /// the far side count against this.
    pub response_timeout: Duration,
    /// Once bytes have arrived, a silent gap this long ends the message.
    pub idle_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Reads until the peer closes its write half, or until the idle window
/// passes after the first bytes. Whatever arrived is returned as-is; an
/// empty buffer means the peer said nothing.
pub(crate) async fn read_message<R>(
    reader: &mut R,
    config: &TransportConfig,
) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let wait = if buffer.is_empty() {
            config.response_timeout
        } else {
            config.idle_timeout
        };
        match timeout(wait, reader.read(&mut chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => buffer.extend_from_slice(chunk.get(..n).unwrap_or_default()),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                debug!("Read window of {:?} elapsed with {} bytes", wait, buffer.len());
                break;
            }
        }
    }

    Ok(buffer)
}

/// TCP transport: connect, send, half-close, read the reply, close.
#[derive(Debug, Clone, Default)]
pub struct RealNetworkClient {
    config: TransportConfig,
}

impl RealNetworkClient {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

#[async_trait]
impl NetworkClient for RealNetworkClient {
    async fn call_node(
        &self,
        address: SocketAddr,
        envelope: Envelope,
    ) -> Result<DhtResponse, RpcError> {
        let method = envelope.request.method();
        debug!("Calling {} on {}", method, address);

        let mut stream = match timeout(self.config.connect_timeout, TcpStream::connect(address)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!("Failed to connect to {}: {}", address, e);
                return Err(RpcError::NoResponse { address });
            }
            Err(_) => {
                error!(
                    "Connection to {} timed out after {:?}",
                    address, self.config.connect_timeout
                );
                return Err(RpcError::Timeout {
                    operation: "connect",
                    address,
                });
            }
        };

        let encoded = bincode::serialize(&envelope)?;
        stream.write_all(&encoded).await?;
        // Closing our write half tells the peer the request is complete
        if let Err(e) = stream.shutdown().await {
            debug!("Shutdown error (non-critical): {}", e);
        }

        let buffer = read_message(&mut stream, &self.config).await?;
        if buffer.is_empty() {
            return Err(RpcError::NoResponse { address });
        }

        let response: DhtResponse = bincode::deserialize(&buffer)?;
        debug!("Received response to {} from {}", method, address);
        Ok(response)
    }
}
