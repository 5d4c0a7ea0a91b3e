//! Full-sync payload compression
//!
//! Full syncs carry every cell of the board and dominate the bytes on
//! the wire, so their serialized form is lz4-compressed. Sparse deltas
//! stay uncompressed; they are already small.

use crate::delta::DeltaBatch;
use crate::StateError;
use rkyv::Deserialize;

/// Serialize and compress a full-sync batch for the wire
pub fn encode_full_sync(batch: &DeltaBatch) -> Result<Vec<u8>, StateError> {
    let bytes = rkyv::to_bytes::<_, 1024>(batch)
        .map_err(|e| StateError::Serialization(e.to_string()))?;
    Ok(lz4_flex::compress_prepend_size(&bytes))
}

/// Decompress and deserialize a full-sync payload received from the peer
pub fn decode_full_sync(payload: &[u8]) -> Result<DeltaBatch, StateError> {
    let bytes = lz4_flex::decompress_size_prepended(payload)
        .map_err(|e| StateError::Compression(format!("lz4 decompression failed: {e}")))?;

    let archived = rkyv::check_archived_root::<DeltaBatch>(&bytes)
        .map_err(|e| StateError::Deserialization(format!("validation failed: {e}")))?;

    archived
        .deserialize(&mut rkyv::Infallible)
        .map_err(|e| StateError::Deserialization(format!("deserialization failed: {e}")))
}
