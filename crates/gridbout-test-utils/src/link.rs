//! In-memory duplex links for protocol tests

use async_trait::async_trait;
use gridbout_network::{Connector, Link, Message, NetworkError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// One end of an in-memory duplex carrying protocol messages
///
/// The blackhole switch silently discards outbound messages, simulating
/// a link that went dark without closing; pongs stop arriving and the
/// liveness machinery has to notice on its own.
pub struct MemoryLink {
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    blackhole: Arc<AtomicBool>,
}

/// Create a connected pair of memory links
pub fn link_pair() -> (MemoryLink, MemoryLink) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    (
        MemoryLink {
            tx: a_tx,
            rx: a_rx,
            blackhole: Arc::new(AtomicBool::new(false)),
        },
        MemoryLink {
            tx: b_tx,
            rx: b_rx,
            blackhole: Arc::new(AtomicBool::new(false)),
        },
    )
}

impl MemoryLink {
    /// Handle for turning this end's sends into silent drops
    pub fn blackhole_switch(&self) -> Arc<AtomicBool> {
        self.blackhole.clone()
    }
}

#[async_trait]
impl Link for MemoryLink {
    async fn send(&mut self, msg: &Message) -> Result<(), NetworkError> {
        if self.blackhole.load(Ordering::Relaxed) {
            return Ok(());
        }
        self.tx
            .send(msg.clone())
            .map_err(|_| NetworkError::Closed)
    }

    async fn recv(&mut self) -> Result<Message, NetworkError> {
        self.rx.recv().await.ok_or(NetworkError::Closed)
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// A connector backed by a finite supply of pre-built links. Each
/// `connect` hands out the next one; an empty supply fails, which is how
/// reconnect-exhaustion tests drive a session to `Terminated`.
pub struct ScriptedConnector {
    links: Mutex<VecDeque<MemoryLink>>,
}

impl ScriptedConnector {
    pub fn new(links: impl IntoIterator<Item = MemoryLink>) -> Self {
        Self {
            links: Mutex::new(links.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn Link>, NetworkError> {
        self.links
            .lock()
            .await
            .pop_front()
            .map(|link| Box::new(link) as Box<dyn Link>)
            .ok_or_else(|| NetworkError::ConnectionFailed("no link available".to_string()))
    }
}
