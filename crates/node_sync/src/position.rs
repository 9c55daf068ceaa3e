//! # Position Cache
//!
//! Owns per-player current position for fast geospatial lookup. Two
//! implementations share the same [`PositionCache`] trait: an in-memory
//! variant and a durable variant that persists to a flat file, the way
//! `node_world`'s chunk store persists chunks (plain `std::fs`, no
//! external database dependency). Callers hold an `Arc<dyn PositionCache>`
//! and never branch on which one is in use.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A player's last known position, used for radius/area queries.
pub trait PositionCache: Send + Sync {
    /// Inserts or overwrites `player`'s position. Constant-time amortized.
    fn upsert(&self, player: u64, pos: (f32, f32));

    /// Removes a player, e.g. on despawn or session end.
    fn remove(&self, player: u64);

    /// Returns every player within `radius` of `center`, as a snapshot
    /// consistent at some point between call and return — concurrent
    /// upserts during the scan may or may not be reflected, but the
    /// result never mixes a partially-applied upsert.
    fn within(&self, center: (f32, f32), radius: f32) -> Vec<(u64, (f32, f32))>;

    /// Current entry count.
    fn len(&self) -> usize;

    /// True if no players are tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process position cache; lost on restart.
#[derive(Default)]
pub struct InMemoryPositionCache {
    entries: RwLock<HashMap<u64, (f32, f32)>>,
}

impl InMemoryPositionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionCache for InMemoryPositionCache {
    fn upsert(&self, player: u64, pos: (f32, f32)) {
        self.entries.write().insert(player, pos);
    }

    fn remove(&self, player: u64) {
        self.entries.write().remove(&player);
    }

    fn within(&self, center: (f32, f32), radius: f32) -> Vec<(u64, (f32, f32))> {
        let radius_sq = radius * radius;
        // Clone the map under one read lock so the scan below sees a
        // single consistent snapshot rather than racing concurrent upserts.
        let snapshot = self.entries.read().clone();
        snapshot
            .into_iter()
            .filter(|&(_, (x, y))| {
                let dx = x - center.0;
                let dy = y - center.1;
                dx * dx + dy * dy <= radius_sq
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Durable position cache: the same in-memory map, mirrored to a flat
/// file on [`flush`](Self::flush) so a restart can recover it with
/// [`open`](Self::open). Persistence is write-behind, not per-upsert —
/// the caller (the sync pipeline's flush timer, typically) decides when
/// to flush, the same division of labor `node_world`'s chunk store uses
/// between `set_block` and `flush_dirty`.
pub struct DurablePositionCache {
    memory: InMemoryPositionCache,
    path: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    player: u64,
    x: f32,
    y: f32,
}

impl DurablePositionCache {
    /// Opens (or creates) a durable cache backed by `path`. If `path`
    /// exists, its contents are loaded; otherwise the cache starts empty.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if `path` exists but cannot be read or
    /// does not contain valid cache data.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let memory = InMemoryPositionCache::new();

        if path.exists() {
            let bytes = std::fs::read(&path)?;
            let entries: Vec<PersistedEntry> = serde_json::from_slice(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            for entry in entries {
                memory.upsert(entry.player, (entry.x, entry.y));
            }
        }

        Ok(Self { memory, path })
    }

    /// Serializes the current contents to `path`, replacing it.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the file cannot be written.
    pub fn flush(&self) -> io::Result<()> {
        let entries: Vec<PersistedEntry> = self
            .memory
            .entries
            .read()
            .iter()
            .map(|(&player, &(x, y))| PersistedEntry { player, x, y })
            .collect();
        let bytes = serde_json::to_vec(&entries).map_err(io::Error::other)?;

        if let Some(parent) = Path::new(&self.path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, bytes)
    }
}

impl PositionCache for DurablePositionCache {
    fn upsert(&self, player: u64, pos: (f32, f32)) {
        self.memory.upsert(player, pos);
    }

    fn remove(&self, player: u64) {
        self.memory.remove(player);
    }

    fn within(&self, center: (f32, f32), radius: f32) -> Vec<(u64, (f32, f32))> {
        self.memory.within(center, radius)
    }

    fn len(&self) -> usize {
        self.memory.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_within_finds_nearby_and_excludes_far() {
        let cache = InMemoryPositionCache::new();
        cache.upsert(1, (0.0, 0.0));
        cache.upsert(2, (3.0, 0.0));
        cache.upsert(3, (100.0, 100.0));

        let nearby = cache.within((0.0, 0.0), 5.0);
        let ids: Vec<u64> = nearby.iter().map(|&(id, _)| id).collect();
        assert!(ids.contains(&1));
        assert!(ids.contains(&2));
        assert!(!ids.contains(&3));
    }

    #[test]
    fn remove_drops_the_entry() {
        let cache = InMemoryPositionCache::new();
        cache.upsert(1, (0.0, 0.0));
        cache.remove(1);
        assert!(cache.is_empty());
    }

    #[test]
    fn durable_cache_round_trips_through_a_file() {
        let dir = std::env::temp_dir().join(format!("node_sync_position_cache_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("positions.json");

        {
            let cache = DurablePositionCache::open(&path).unwrap();
            cache.upsert(7, (1.5, 2.5));
            cache.flush().unwrap();
        }

        let reopened = DurablePositionCache::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        let found = reopened.within((1.5, 2.5), 0.1);
        assert_eq!(found, vec![(7, (1.5, 2.5))]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn opening_a_missing_path_starts_empty() {
        let path = std::env::temp_dir().join(format!("node_sync_position_cache_missing_{}.json", std::process::id()));
        std::fs::remove_file(&path).ok();

        let cache = DurablePositionCache::open(&path).unwrap();
        assert!(cache.is_empty());
    }
}
