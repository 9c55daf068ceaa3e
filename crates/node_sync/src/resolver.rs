//! # Conflict Resolver
//!
//! Reconciles a locally-stored change against an incoming remote one
//! for the same coalescing key. The resolver is a capability trait so
//! alternate policies (e.g. CRDT-style merge for counters) can be
//! plugged in per record kind; the default is Last-Writer-Wins.

use crate::delta::ChangeRecord;

/// What to do with an incoming remote record once compared against
/// whatever is currently stored for the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Apply the incoming record, replacing the stored state.
    Replace,
    /// Discard the incoming record; the stored state already wins.
    Keep,
}

/// A conflict-resolution policy for reconciling concurrent mutations
/// across regions.
///
/// Implementations must be deterministic: identical inputs always
/// produce identical outputs on every node, which is what makes
/// eventual convergence observable.
pub trait ConflictResolver: Send + Sync {
    /// Decides whether `incoming` should replace `existing`.
    fn resolve(&self, existing: &ChangeRecord, incoming: &ChangeRecord) -> Resolution;
}

/// Last-Writer-Wins keyed by `(timestamp, region_id)`, with region id
/// as the deterministic tiebreaker when timestamps collide.
#[derive(Clone, Copy, Debug, Default)]
pub struct LastWriterWins;

impl ConflictResolver for LastWriterWins {
    fn resolve(&self, existing: &ChangeRecord, incoming: &ChangeRecord) -> Resolution {
        let existing_key = (existing.timestamp_ms, existing.region_id);
        let incoming_key = (incoming.timestamp_ms, incoming.region_id);

        if incoming_key > existing_key {
            Resolution::Replace
        } else {
            Resolution::Keep
        }
    }
}
