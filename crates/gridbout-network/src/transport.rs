//! QUIC transport implementation for gridbout
//!
//! One peer listens, the other dials; a single long-lived bidirectional
//! stream carries every protocol frame. The [`Link`] trait is what the
//! session manager holds, so tests can substitute an in-memory duplex.

use crate::cert_validation::SkipServerVerification;
use crate::protocol::{FramedCodec, Message, MessageStats};
use crate::NetworkError;
use async_trait::async_trait;
use bytes::BytesMut;
use quinn::{ClientConfig, Connection, Endpoint, RecvStream, SendStream, ServerConfig, VarInt};
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// ALPN protocol identifier for gridbout
const ALPN_GRIDBOUT: &[u8] = b"gridbout/1";

/// How much stream data to pull per read
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Configuration for the transport layer
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Maximum idle timeout before QUIC closes the connection. Liveness
    /// is owned by the protocol's own ping/pong, so this stays well
    /// above the disconnect threshold.
    pub max_idle_timeout: Duration,
    /// Stream receive window
    pub stream_receive_window: VarInt,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_idle_timeout: Duration::from_secs(60),
            stream_receive_window: VarInt::from_u32(256 * 1024),
        }
    }
}

/// A message pipe to the peer. Sends are fire-and-forget; `recv` resolves
/// with the next complete frame or [`NetworkError::Closed`].
#[async_trait]
pub trait Link: Send {
    async fn send(&mut self, msg: &Message) -> Result<(), NetworkError>;
    async fn recv(&mut self) -> Result<Message, NetworkError>;
    async fn close(&mut self);
}

/// Produces a fresh [`Link`] to the peer; invoked on connect and again on
/// every reconnection attempt
#[async_trait]
pub trait Connector: Send {
    async fn connect(&self) -> Result<Box<dyn Link>, NetworkError>;
}

/// A [`Link`] over one QUIC bidirectional stream
pub struct QuicLink {
    connection: Connection,
    send: SendStream,
    recv: RecvStream,
    read_buf: BytesMut,
    stats: MessageStats,
}

impl QuicLink {
    fn new(connection: Connection, send: SendStream, recv: RecvStream) -> Self {
        Self {
            connection,
            send,
            recv,
            read_buf: BytesMut::new(),
            stats: MessageStats::default(),
        }
    }

    /// Remote peer address
    pub fn remote_address(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Traffic counters for this link
    pub fn stats(&self) -> &MessageStats {
        &self.stats
    }
}

#[async_trait]
impl Link for QuicLink {
    async fn send(&mut self, msg: &Message) -> Result<(), NetworkError> {
        let mut buf = BytesMut::new();
        FramedCodec::encode(msg, &mut buf)?;

        self.send
            .write_all(&buf)
            .await
            .map_err(|e| NetworkError::TransportError(format!("Write failed: {e}")))?;

        self.stats.record_sent(buf.len());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Message, NetworkError> {
        loop {
            if let Some(msg) = FramedCodec::decode(&mut self.read_buf)? {
                self.stats.messages_received += 1;
                return Ok(msg);
            }

            let chunk = self
                .recv
                .read_chunk(READ_CHUNK_BYTES, true)
                .await
                .map_err(|e| NetworkError::TransportError(format!("Read failed: {e}")))?;

            match chunk {
                Some(chunk) => {
                    self.stats.bytes_received += chunk.bytes.len() as u64;
                    self.read_buf.extend_from_slice(&chunk.bytes);
                }
                None => return Err(NetworkError::Closed),
            }
        }
    }

    async fn close(&mut self) {
        self.connection.close(VarInt::from_u32(0), b"session closed");
    }
}

/// Listening side of the peer pair
pub struct PeerListener {
    endpoint: Endpoint,
}

impl PeerListener {
    /// Bind a listening endpoint with a self-signed certificate
    pub fn bind(bind_addr: SocketAddr, config: LinkConfig) -> Result<Self, NetworkError> {
        let server_config = create_server_config(&config)?;
        let endpoint = Endpoint::server(server_config, bind_addr)
            .map_err(|e| NetworkError::TransportError(format!("Failed to bind endpoint: {e}")))?;

        Ok(Self { endpoint })
    }

    /// The bound address, useful when binding to port 0
    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.endpoint
            .local_addr()
            .map_err(|e| NetworkError::TransportError(format!("Failed to get local address: {e}")))
    }

    /// Accept the peer's connection and its protocol stream. The stream
    /// becomes visible once the dialer sends its first frame
    /// (`PlayerReady`), so this resolves with a ready-to-read link.
    pub async fn accept(&self) -> Result<QuicLink, NetworkError> {
        let connecting = self
            .endpoint
            .accept()
            .await
            .ok_or_else(|| NetworkError::TransportError("Endpoint closed".to_string()))?;

        let connection = connecting
            .await
            .map_err(|e| NetworkError::ConnectionFailed(format!("Failed to accept: {e}")))?;

        let (send, recv) = connection
            .accept_bi()
            .await
            .map_err(|e| NetworkError::TransportError(format!("Failed to accept stream: {e}")))?;

        debug!(remote = %connection.remote_address(), "peer connected");
        Ok(QuicLink::new(connection, send, recv))
    }
}

#[async_trait]
impl Connector for PeerListener {
    /// The listening side "reconnects" by waiting for the peer to
    /// re-dial
    async fn connect(&self) -> Result<Box<dyn Link>, NetworkError> {
        self.accept().await.map(|link| Box::new(link) as Box<dyn Link>)
    }
}

/// Dialing side of the peer pair; re-dials the same endpoint on
/// reconnection
pub struct PeerConnector {
    endpoint: Endpoint,
    peer_addr: SocketAddr,
    config: LinkConfig,
}

impl PeerConnector {
    /// Create a dialer for the given peer address
    pub fn new(peer_addr: SocketAddr, config: LinkConfig) -> Result<Self, NetworkError> {
        let endpoint = Endpoint::client("[::]:0".parse().map_err(|e| {
            NetworkError::TransportError(format!("Invalid bind address: {e}"))
        })?)
        .map_err(|e| NetworkError::TransportError(format!("Failed to create endpoint: {e}")))?;

        Ok(Self {
            endpoint,
            peer_addr,
            config,
        })
    }
}

#[async_trait]
impl Connector for PeerConnector {
    async fn connect(&self) -> Result<Box<dyn Link>, NetworkError> {
        let client_config = create_client_config(&self.config)?;

        let connection = self
            .endpoint
            .connect_with(client_config, self.peer_addr, "gridbout-peer")
            .map_err(|e| NetworkError::ConnectionFailed(format!("Failed to initiate: {e}")))?
            .await
            .map_err(|e| NetworkError::ConnectionFailed(format!("Connection failed: {e}")))?;

        let (send, recv) = connection
            .open_bi()
            .await
            .map_err(|e| NetworkError::TransportError(format!("Failed to open stream: {e}")))?;

        debug!(remote = %connection.remote_address(), "connected to peer");
        Ok(Box::new(QuicLink::new(connection, send, recv)))
    }
}

/// Create client configuration
fn create_client_config(config: &LinkConfig) -> Result<ClientConfig, NetworkError> {
    let mut client_crypto = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
        .with_no_client_auth();

    client_crypto.alpn_protocols = vec![ALPN_GRIDBOUT.to_vec()];

    let mut client_config = ClientConfig::new(Arc::new(
        quinn::crypto::rustls::QuicClientConfig::try_from(client_crypto).map_err(|e| {
            NetworkError::TransportError(format!("Failed to create QUIC client config: {e}"))
        })?,
    ));

    client_config.transport_config(Arc::new(create_transport_config(config)));

    Ok(client_config)
}

/// Create server configuration with a self-signed certificate
fn create_server_config(config: &LinkConfig) -> Result<ServerConfig, NetworkError> {
    let cert = rcgen::generate_simple_self_signed(vec!["gridbout-peer".to_string()])
        .map_err(|e| NetworkError::TransportError(format!("Failed to generate cert: {e}")))?;

    let cert_der = CertificateDer::from(cert.cert);
    let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    let mut server_crypto = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der.into())
        .map_err(|e| NetworkError::TransportError(format!("Failed to create crypto config: {e}")))?;

    server_crypto.alpn_protocols = vec![ALPN_GRIDBOUT.to_vec()];

    let mut server_config = ServerConfig::with_crypto(Arc::new(
        quinn::crypto::rustls::QuicServerConfig::try_from(server_crypto).map_err(|e| {
            NetworkError::TransportError(format!("Failed to create QUIC server config: {e}"))
        })?,
    ));

    server_config.transport_config(Arc::new(create_transport_config(config)));

    Ok(server_config)
}

/// Create QUIC transport configuration
fn create_transport_config(config: &LinkConfig) -> quinn::TransportConfig {
    let mut transport = quinn::TransportConfig::default();

    if let Ok(timeout) = config.max_idle_timeout.try_into() {
        transport.max_idle_timeout(Some(timeout));
    }
    transport.stream_receive_window(config.stream_receive_window);
    transport.receive_window(config.stream_receive_window);

    transport
}
