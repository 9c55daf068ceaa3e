//! # Chunk Modification Wire Format
//!
//! Compact encode/decode for a single block mutation, as recorded by
//! the delta recorder and replayed during durable-log recovery. Kept
//! separate from `ChunkStore` so the wire format doesn't leak into the
//! in-memory spatial index.

/// Operation kinds carried by the durable log for world mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkOpType {
    /// A single block was set or cleared.
    BlockModify = 1,
    /// A batch of block modifications landed together (e.g. a build tool).
    BlockBatch = 2,
    /// A chunk was fully checkpointed to disk.
    ChunkCheckpoint = 3,
}

impl ChunkOpType {
    /// Converts from the wire tag.
    #[must_use]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::BlockModify),
            2 => Some(Self::BlockBatch),
            3 => Some(Self::ChunkCheckpoint),
            _ => None,
        }
    }
}

/// Serialized single-block modification, independent of metadata (the
/// metadata map, when present, rides in the surrounding delta record's
/// own variable-length section).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockModifyPayload {
    /// Layer index (0=FLOOR, 1=ACTIVE, 2=CEILING).
    pub layer: u8,
    /// World block X coordinate.
    pub x: i32,
    /// World block Y coordinate.
    pub y: i32,
    /// New block id (`0` clears the cell).
    pub block_id: u32,
    /// Tick the mutation was applied on.
    pub tick: u64,
}

impl BlockModifyPayload {
    const ENCODED_LEN: usize = 1 + 4 + 4 + 4 + 8;

    /// Serializes to a fixed-length little-endian byte buffer.
    #[must_use]
    pub fn serialize(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0u8; Self::ENCODED_LEN];
        buf[0] = self.layer;
        buf[1..5].copy_from_slice(&self.x.to_le_bytes());
        buf[5..9].copy_from_slice(&self.y.to_le_bytes());
        buf[9..13].copy_from_slice(&self.block_id.to_le_bytes());
        buf[13..21].copy_from_slice(&self.tick.to_le_bytes());
        buf
    }

    /// Deserializes from bytes, returning `None` if too short.
    #[must_use]
    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < Self::ENCODED_LEN {
            return None;
        }
        Some(Self {
            layer: data[0],
            x: i32::from_le_bytes(data[1..5].try_into().ok()?),
            y: i32::from_le_bytes(data[5..9].try_into().ok()?),
            block_id: u32::from_le_bytes(data[9..13].try_into().ok()?),
            tick: u64::from_le_bytes(data[13..21].try_into().ok()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_modify_payload_roundtrip() {
        let payload = BlockModifyPayload { layer: 1, x: -5, y: 10, block_id: 42, tick: 999_999 };
        let bytes = payload.serialize();
        let restored = BlockModifyPayload::deserialize(&bytes).unwrap();
        assert_eq!(payload, restored);
    }

    #[test]
    fn test_deserialize_rejects_short_buffer() {
        assert!(BlockModifyPayload::deserialize(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_op_type_roundtrip() {
        assert_eq!(ChunkOpType::from_u8(1), Some(ChunkOpType::BlockModify));
        assert_eq!(ChunkOpType::from_u8(255), None);
    }
}
