//! # Snapshot Buffering & Delta Assembly
//!
//! Server-side only: the authoritative per-tick snapshot a session's
//! client consumes is built here from the simulator's full entity/block
//! state plus that session's own `DeltaCompressor`, bounded to what fits
//! in one `WorldSnapshot` packet.
//!
//! ```text
//! Simulator tick N  ──>  full entity/block lists
//!                              │
//!                   per-session DeltaCompressor
//!                              │
//!                   WorldSnapshot{ only what changed }  ──>  transport
//! ```

use crate::protocol::{BlockUpdate, DeltaCompressor, EntityState, WorldSnapshot};

/// Builds bandwidth-bounded snapshots for one session from the
/// simulator's authoritative state.
pub struct SnapshotBuilder {
    delta: DeltaCompressor,
}

impl SnapshotBuilder {
    /// Creates a new builder with an empty delta baseline.
    #[must_use]
    pub fn new() -> Self {
        Self { delta: DeltaCompressor::new() }
    }

    /// Builds the snapshot for `tick` from the full entity/block lists,
    /// including only entities that changed enough to matter and
    /// stopping once the packet's bounded arrays are full.
    pub fn build(&mut self, tick: u32, entities: &[EntityState], block_updates: &[BlockUpdate]) -> WorldSnapshot {
        let mut snapshot = WorldSnapshot::empty(tick);

        for entity in entities {
            if !self.delta.should_include(entity) {
                continue;
            }
            if !snapshot.add_entity(*entity) {
                break;
            }
        }

        for update in block_updates {
            if !snapshot.add_block_update(*update) {
                break;
            }
        }

        snapshot
    }

    /// Drops delta bookkeeping for an entity that despawned or left the
    /// session's area of interest.
    pub fn forget(&mut self, entity_id: u32) {
        self.delta.forget(entity_id);
    }

    /// Forces every entity to be resent on the next `build` call, e.g.
    /// after a reconnect or a large area-of-interest jump.
    pub fn force_full_resync(&mut self) {
        self.delta.reset();
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Ring buffer of recent authoritative snapshots, keyed by tick.
///
/// Used to serve late joiners a recent baseline and to support bounded
/// replay for diagnostics; it is not used for client-side interpolation,
/// which is entirely the collaborating client's concern.
pub struct SnapshotHistory {
    snapshots: Vec<WorldSnapshot>,
    write_index: usize,
    count: usize,
}

impl SnapshotHistory {
    /// Creates a history ring buffer holding up to `capacity` snapshots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { snapshots: vec![WorldSnapshot::default(); capacity.max(1)], write_index: 0, count: 0 }
    }

    /// Records a snapshot.
    pub fn push(&mut self, snapshot: WorldSnapshot) {
        self.snapshots[self.write_index] = snapshot;
        self.write_index = (self.write_index + 1) % self.snapshots.len();
        self.count = (self.count + 1).min(self.snapshots.len());
    }

    /// Finds a snapshot by tick, most recent first.
    #[must_use]
    pub fn get(&self, tick: u32) -> Option<&WorldSnapshot> {
        for i in 0..self.count {
            let idx = (self.write_index + self.snapshots.len() - 1 - i) % self.snapshots.len();
            if self.snapshots[idx].tick == tick {
                return Some(&self.snapshots[idx]);
            }
        }
        None
    }

    /// Returns the most recently recorded snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<&WorldSnapshot> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.write_index + self.snapshots.len() - 1) % self.snapshots.len();
        Some(&self.snapshots[idx])
    }

    /// Number of buffered snapshots.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_includes_only_changed_entities() {
        let mut builder = SnapshotBuilder::new();
        let e1 = EntityState { entity_id: 1, pos_x: 0, pos_y: 0, ..Default::default() };

        let snap1 = builder.build(1, &[e1], &[]);
        assert_eq!(snap1.entity_count, 1);

        let snap2 = builder.build(2, &[e1], &[]);
        assert_eq!(snap2.entity_count, 0, "unchanged entity should be filtered on the second tick");
    }

    #[test]
    fn test_force_full_resync_resends_unchanged_entities() {
        let mut builder = SnapshotBuilder::new();
        let e1 = EntityState { entity_id: 1, ..Default::default() };
        builder.build(1, &[e1], &[]);
        builder.force_full_resync();
        let snap = builder.build(2, &[e1], &[]);
        assert_eq!(snap.entity_count, 1);
    }

    #[test]
    fn test_history_eviction_and_lookup() {
        let mut history = SnapshotHistory::new(3);
        for tick in 1..=5 {
            history.push(WorldSnapshot::empty(tick));
        }
        assert_eq!(history.count(), 3);
        assert_eq!(history.latest().unwrap().tick, 5);
        assert!(history.get(2).is_none());
        assert!(history.get(4).is_some());
    }
}
