//! # Delta Recorder
//!
//! Every authoritative mutation produced locally is appended to an
//! in-memory ring as a [`ChangeRecord`](crate::delta::ChangeRecord),
//! stamped with the next region-monotonic sequence. The batch producer
//! (`crate::batch`) drains this ring.
//!
//! Modeled on the teacher's write-ahead log: a monotonic sequence
//! counter assigned under one lock, held only long enough to append.
//! Unlike a disk WAL there is no fsync — durability here comes from
//! the event bus, not the local ring.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::delta::{ChangeKind, ChangeRecord};

/// Ring buffer high-water mark beyond which new records trigger
/// coalescing of the oldest unsent entries rather than growing further.
const DEFAULT_HIGH_WATER_MARK: usize = 50_000;

/// Records local mutations for later batching and publication.
///
/// Back-pressure (§4.4): when the ring exceeds its high-water mark,
/// newly recorded changes still commit locally, but the oldest unsent
/// records sharing a coalescing key are collapsed so only the latest
/// survives. `BlockSet` supersedes an older `BlockSet`/`BlockDelete` on
/// the same cell; `EntityMove` keeps only the most recent per entity id.
pub struct DeltaRecorder {
    region_id: u32,
    sequence: AtomicU64,
    ring: Mutex<VecDeque<ChangeRecord>>,
    high_water_mark: usize,
}

impl DeltaRecorder {
    /// Creates a new recorder for the given region, with the default
    /// high-water mark.
    #[must_use]
    pub fn new(region_id: u32) -> Self {
        Self::with_high_water_mark(region_id, DEFAULT_HIGH_WATER_MARK)
    }

    /// Creates a new recorder with an explicit high-water mark.
    #[must_use]
    pub fn with_high_water_mark(region_id: u32, high_water_mark: usize) -> Self {
        Self {
            region_id,
            sequence: AtomicU64::new(0),
            ring: Mutex::new(VecDeque::new()),
            high_water_mark,
        }
    }

    /// Records a mutation, assigning it the next region-monotonic
    /// sequence and timestamp.
    pub fn record(&self, kind: ChangeKind, timestamp_ms: u64) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let record = ChangeRecord {
            sequence,
            region_id: self.region_id,
            timestamp_ms,
            kind,
        };

        let mut ring = self.ring.lock();
        ring.push_back(record);

        if ring.len() > self.high_water_mark {
            Self::coalesce(&mut ring);
        }
    }

    /// Collapses the ring so that, for each coalescing key, only the
    /// most recently appended record survives. Relative order of the
    /// surviving records is preserved.
    fn coalesce(ring: &mut VecDeque<ChangeRecord>) {
        let mut seen = std::collections::HashSet::new();
        let mut kept = VecDeque::with_capacity(ring.len());

        for record in ring.drain(..).rev() {
            if seen.insert(record.coalesce_key()) {
                kept.push_front(record);
            }
        }

        *ring = kept;
    }

    /// Drains up to `max_count` records from the ring, in submission
    /// order. Used by the batch producer to build a batch.
    pub fn drain(&self, max_count: usize) -> Vec<ChangeRecord> {
        let mut ring = self.ring.lock();
        let count = ring.len().min(max_count);
        ring.drain(..count).collect()
    }

    /// Number of records currently pending publication.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.ring.lock().len()
    }

    /// The oldest pending record's sequence, if any. The batch producer
    /// uses this to decide whether `FlushEvery` has elapsed.
    #[must_use]
    pub fn oldest_pending_sequence(&self) -> Option<u64> {
        self.ring.lock().front().map(|r| r.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_set(x: i32) -> ChangeKind {
        ChangeKind::BlockSet { x, y: 0, layer: 0, block_id: 1 }
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let recorder = DeltaRecorder::new(1);
        recorder.record(block_set(0), 0);
        recorder.record(block_set(1), 1);

        let drained = recorder.drain(10);
        assert_eq!(drained[0].sequence, 0);
        assert_eq!(drained[1].sequence, 1);
    }

    #[test]
    fn drain_respects_max_count_and_order() {
        let recorder = DeltaRecorder::new(1);
        for i in 0..5 {
            recorder.record(block_set(i), i as u64);
        }

        let first = recorder.drain(3);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].sequence, 0);

        let rest = recorder.drain(10);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].sequence, 3);
    }

    #[test]
    fn coalescing_keeps_latest_write_per_cell_under_pressure() {
        let recorder = DeltaRecorder::with_high_water_mark(1, 4);
        for i in 0..6 {
            recorder.record(block_set(0), i as u64);
        }

        let drained = recorder.drain(10);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].sequence, 5);
    }

    #[test]
    fn coalescing_keeps_latest_position_per_entity() {
        let recorder = DeltaRecorder::with_high_water_mark(1, 2);
        recorder.record(ChangeKind::EntityMove { entity_id: 1, x: 0.0, y: 0.0 }, 0);
        recorder.record(ChangeKind::EntityMove { entity_id: 2, x: 0.0, y: 0.0 }, 1);
        recorder.record(ChangeKind::EntityMove { entity_id: 1, x: 5.0, y: 5.0 }, 2);

        let drained = recorder.drain(10);
        assert_eq!(drained.len(), 2);
        let moved = drained
            .iter()
            .find(|r| matches!(r.kind, ChangeKind::EntityMove { entity_id: 1, .. }))
            .unwrap();
        assert!(matches!(moved.kind, ChangeKind::EntityMove { x, .. } if (x - 5.0).abs() < f32::EPSILON));
    }
}
