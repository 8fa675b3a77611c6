//! Deterministic stand-ins for encoded media
//!
//! Chunks carry a recognizable gradient so tests can check ordering after
//! concatenation.

use bytes::Bytes;
use uuid::Uuid;

use crate::types::{ClipRecord, QualityTier};

/// Chunk number `seq` of `size` bytes
pub fn synthetic_chunk(seq: u64, size: usize) -> Bytes {
    let base = (seq % 256) as u8;
    (0..size)
        .map(|i| base.wrapping_add((i % 256) as u8))
        .collect::<Vec<u8>>()
        .into()
}

/// A finished clip captured at `captured_at_ms`
pub fn synthetic_clip(captured_at_ms: i64, quality: QualityTier) -> ClipRecord {
    let payload = (0..4u64)
        .flat_map(|seq| synthetic_chunk(seq, 64).to_vec())
        .collect::<Vec<u8>>();

    ClipRecord {
        id: Uuid::new_v4(),
        payload: payload.into(),
        captured_at_ms,
        duration_ms: 1_000,
        quality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_chunk_size() {
        assert_eq!(synthetic_chunk(0, 128).len(), 128);
        assert!(synthetic_chunk(3, 0).is_empty());
    }

    #[test]
    fn test_synthetic_chunks_differ() {
        let chunk0 = synthetic_chunk(0, 32);
        let chunk1 = synthetic_chunk(1, 32);
        assert_ne!(chunk0[0], chunk1[0]);
        assert_eq!(chunk1[0], 1);
    }

    #[test]
    fn test_synthetic_clip() {
        let clip = synthetic_clip(42, QualityTier::Low);
        assert_eq!(clip.captured_at_ms, 42);
        assert_eq!(clip.size_bytes(), 256);
        assert_ne!(synthetic_clip(42, QualityTier::Low).id, clip.id);
    }
}
