//! State synchronization for gridbout
//!
//! Implements delta tracking between board snapshots, run-length
//! compression of changesets, the delta-versus-full-sync transmission
//! policy, and the garbage queue that turns opponent attacks into board
//! rows. Everything here is synchronous and single-writer; the session
//! actor in `gridbout-session` serializes access.

pub mod compress;
pub mod delta;
pub mod garbage;
pub mod policy;
pub mod rle;

pub use compress::{decode_full_sync, encode_full_sync};
pub use delta::{CellDelta, DeltaBatch, DeltaTracker, ScalarState};
pub use garbage::GarbageQueue;
pub use policy::{SyncConfig, SyncDecision, SyncPolicy, SyncStats};
pub use rle::{CompressedBatch, CompressedRun};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Cell delta out of range at ({x}, {y})")]
    OutOfRange { x: u8, y: u8 },

    #[error("Board dimension mismatch: tracker is {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    DimensionMismatch {
        expected_rows: u8,
        expected_cols: u8,
        rows: u8,
        cols: u8,
    },

    #[error("Compression error: {0}")]
    Compression(String),
}
