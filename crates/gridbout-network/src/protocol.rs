//! Protocol message definitions and framing for gridbout
//!
//! Uses rkyv for zero-copy serialization of messages. Every message is a
//! typed variant with a fixed payload schema, decoded exactly once at
//! the dispatch boundary; there is no opaque inner encoding to branch on.

use crate::NetworkError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use gridbout_board::RowMask;
use gridbout_state::{CompressedBatch, DeltaBatch};
use rkyv::{Archive, Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Messages in the gridbout peer protocol
#[derive(Archive, Deserialize, Serialize, Debug, Clone)]
#[archive(check_bytes)]
pub enum Message {
    /// Handshake: this peer is connected and ready to play
    PlayerReady,

    /// Heartbeat probe carrying the sender's clock in microseconds
    Ping { timestamp_micros: u64 },

    /// Heartbeat reply; the probe's timestamp echoed back unchanged
    Pong { timestamp_micros: u64 },

    /// Sparse board changes since the last batch
    BoardDelta(DeltaBatch),

    /// Run-length compressed board changes
    BoardDeltaCompressed(CompressedBatch),

    /// Exhaustive board state; payload is the lz4-compressed serialized
    /// batch (see `gridbout_state::encode_full_sync`)
    BoardFullSync { payload: Vec<u8> },

    /// Attack: one mask per cleared row, in row order
    LineAttack { masks: Vec<RowMask> },

    /// The sender's game ended
    GameOver,
}

impl Message {
    /// Current wall clock in microseconds, for ping/pong timestamps
    pub fn timestamp_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }

    /// Serialize message to bytes
    pub fn to_bytes(&self) -> Result<Bytes, NetworkError> {
        let bytes = rkyv::to_bytes::<_, 256>(self)
            .map_err(|e| NetworkError::ProtocolError(format!("Serialization failed: {e}")))?;
        Ok(Bytes::from(bytes.to_vec()))
    }

    /// Deserialize message from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NetworkError> {
        let archived = rkyv::check_archived_root::<Self>(bytes)
            .map_err(|e| NetworkError::ProtocolError(format!("Validation failed: {e}")))?;

        let deserialized: Self = archived
            .deserialize(&mut rkyv::Infallible)
            .map_err(|e| NetworkError::ProtocolError(format!("Deserialization failed: {e}")))?;

        Ok(deserialized)
    }
}

/// Frame encoder/decoder for the message stream
pub struct FramedCodec;

impl FramedCodec {
    /// Encode a message with length prefix
    pub fn encode(msg: &Message, buf: &mut BytesMut) -> Result<(), NetworkError> {
        let payload = msg.to_bytes()?;

        // 4-byte big-endian length prefix
        if payload.len() > u32::MAX as usize {
            return Err(NetworkError::ProtocolError("Message too large".to_string()));
        }

        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(&payload);

        Ok(())
    }

    /// Decode a message from the buffer. Returns `Ok(None)` if more data
    /// is needed for a complete frame.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Message>, NetworkError> {
        if buf.len() < 4 {
            return Ok(None);
        }

        // Peek at the length without consuming it
        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&buf[..4]);
        let length = u32::from_be_bytes(length_bytes) as usize;

        if buf.len() < 4 + length {
            return Ok(None);
        }

        buf.advance(4);

        // Move the frame into its own allocation so rkyv sees aligned bytes
        let msg_bytes = buf.split_to(length).to_vec();

        Message::from_bytes(&msg_bytes).map(Some)
    }
}

/// Message statistics for debugging/monitoring
#[derive(Debug, Default, Clone)]
pub struct MessageStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl MessageStats {
    pub fn record_sent(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.messages_received += 1;
        self.bytes_received += bytes as u64;
    }
}
