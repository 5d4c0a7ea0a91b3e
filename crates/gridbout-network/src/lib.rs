//! Network transport layer for gridbout
//!
//! Defines the peer-to-peer wire protocol (typed messages with
//! length-prefixed rkyv framing) and the QUIC transport the two peers
//! exchange them over. The `Link` trait is the seam the session manager
//! talks through, so protocol logic is testable over in-memory duplexes.

pub mod cert_validation;
pub mod protocol;
pub mod transport;

pub use cert_validation::install_crypto_provider;
pub use protocol::{FramedCodec, Message, MessageStats};
pub use transport::{Connector, Link, LinkConfig, PeerConnector, PeerListener, QuicLink};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Connection closed by peer")]
    Closed,

    #[error("Timeout")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
