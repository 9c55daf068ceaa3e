//! # Change Records
//!
//! Every authoritative mutation produced locally yields a `ChangeRecord`
//! stamped with the next region-monotonic sequence. These are what the
//! delta recorder appends to its ring, what the batch producer publishes,
//! and what the conflict resolver reconciles on the remote side.

use serde::{Deserialize, Serialize};

/// A single cell or entity mutation, tagged with enough context for a
/// remote region to apply it through the conflict resolver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// A block was placed or changed on a chunk layer.
    BlockSet {
        /// Chunk-local or world cell x coordinate.
        x: i32,
        /// Chunk-local or world cell y coordinate.
        y: i32,
        /// The chunk layer the block belongs to (FLOOR/ACTIVE/CEILING).
        layer: u8,
        /// New block id.
        block_id: u16,
    },
    /// A block was removed (set to air) on a chunk layer.
    BlockDelete {
        /// Chunk-local or world cell x coordinate.
        x: i32,
        /// Chunk-local or world cell y coordinate.
        y: i32,
        /// The chunk layer the block belongs to.
        layer: u8,
    },
    /// An entity was created.
    EntitySpawn {
        /// The entity's id.
        entity_id: u64,
        /// The entity's type tag.
        kind: u8,
        /// Spawn position x.
        x: f32,
        /// Spawn position y.
        y: f32,
    },
    /// An entity was destroyed.
    EntityDespawn {
        /// The entity's id.
        entity_id: u64,
    },
    /// An entity moved.
    EntityMove {
        /// The entity's id.
        entity_id: u64,
        /// New position x.
        x: f32,
        /// New position y.
        y: f32,
    },
    /// An entity attribute changed (health, hunger, inventory slot, ...).
    EntityAttr {
        /// The entity's id.
        entity_id: u64,
        /// The attribute key.
        key: String,
        /// The attribute's new value, serialized.
        value: AttrValue,
    },
}

/// Wire representation of an attribute value, mirroring the node's own
/// typed attribute map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// Integer attribute value.
    Int(i64),
    /// Floating point attribute value.
    Float(f64),
    /// Boolean attribute value.
    Bool(bool),
    /// Text attribute value.
    Text(String),
}

/// A `ChangeKind` stamped with its origin and ordering metadata.
///
/// The `(timestamp, region)` pair is what the conflict resolver (§4.5)
/// compares to decide whether an incoming record supersedes what is
/// currently stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Region-monotonic sequence number, unique within the origin region.
    pub sequence: u64,
    /// Id of the region that produced this record.
    pub region_id: u32,
    /// Wall-clock timestamp (milliseconds since epoch) at the time of
    /// the mutation, used as the primary conflict-resolution key.
    pub timestamp_ms: u64,
    /// The mutation itself.
    pub kind: ChangeKind,
}

impl ChangeRecord {
    /// The coalescing key for this record: records that share a key are
    /// candidates for superseding one another under back-pressure.
    ///
    /// Block mutations key by cell+layer; entity mutations key by
    /// entity id. Records with different keys never collide.
    #[must_use]
    pub fn coalesce_key(&self) -> CoalesceKey {
        match &self.kind {
            ChangeKind::BlockSet { x, y, layer, .. } | ChangeKind::BlockDelete { x, y, layer } => {
                CoalesceKey::Cell(*x, *y, *layer)
            }
            ChangeKind::EntitySpawn { entity_id, .. }
            | ChangeKind::EntityDespawn { entity_id }
            | ChangeKind::EntityMove { entity_id, .. }
            | ChangeKind::EntityAttr { entity_id, .. } => CoalesceKey::Entity(*entity_id),
        }
    }
}

/// Identifies the target a `ChangeRecord` mutates, for coalescing
/// purposes under back-pressure (§4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoalesceKey {
    /// A chunk cell on a given layer.
    Cell(i32, i32, u8),
    /// An entity, identified by id.
    Entity(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesce_key_groups_block_writes_by_cell_and_layer() {
        let a = ChangeRecord {
            sequence: 1,
            region_id: 0,
            timestamp_ms: 0,
            kind: ChangeKind::BlockSet { x: 1, y: 2, layer: 0, block_id: 5 },
        };
        let b = ChangeRecord {
            sequence: 2,
            region_id: 0,
            timestamp_ms: 1,
            kind: ChangeKind::BlockSet { x: 1, y: 2, layer: 0, block_id: 9 },
        };
        assert_eq!(a.coalesce_key(), b.coalesce_key());
    }

    #[test]
    fn coalesce_key_distinguishes_entities_from_cells() {
        let block = ChangeRecord {
            sequence: 1,
            region_id: 0,
            timestamp_ms: 0,
            kind: ChangeKind::BlockSet { x: 0, y: 0, layer: 1, block_id: 1 },
        };
        let entity = ChangeRecord {
            sequence: 2,
            region_id: 0,
            timestamp_ms: 0,
            kind: ChangeKind::EntityMove { entity_id: 7, x: 0.0, y: 0.0 },
        };
        assert_ne!(block.coalesce_key(), entity.coalesce_key());
    }
}
