//! Session management for gridbout
//!
//! One [`SessionManager`] per peer owns the connection lifecycle:
//! handshake, heartbeat-based liveness and RTT, timeout-driven disconnect
//! detection, bounded-retry reconnection, and dispatch of inbound
//! messages to the delta tracker, the garbage queue, and the game hooks.
//!
//! The manager is an actor: a single tokio task owns the board mirrors,
//! the tracker, and the garbage queue, and everything else talks to it
//! through a [`SessionHandle`]. Board, flags, and queue are therefore
//! mutated by exactly one writer, and a delta computation can never
//! observe a half-applied injection.

pub mod config;
pub mod hooks;
pub mod session;

pub use config::SessionConfig;
pub use hooks::GameHooks;
pub use session::{Liveness, SessionHandle, SessionManager, SessionState};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Network error: {0}")]
    Network(#[from] gridbout_network::NetworkError),
}
