//! Caching of per-stop visit enumerations.
//!
//! Enumerating a busy station's visits for a window touches every stop-time
//! at the station and its platforms. The enumeration only depends on the
//! loaded data, not on the current second, so it is memoised per
//! (stop, date, window). Keys carry the load-state generation: a completed
//! refresh makes every older entry unreachable without an explicit flush.
//!
//! Minute-granular window bounds bound cache cardinality while keeping
//! entries exact.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache as MokaCache;

use crate::domain::{ServiceDate, StopId, TimeWindow};
use crate::provider::StopVisit;

/// Cache key: (stop, date, window start minute, window end minute, generation).
pub type BoardKey = (StopId, ServiceDate, u32, u32, u64);

/// Cached visit list.
pub type BoardEntry = Arc<Vec<StopVisit>>;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            max_capacity: 2000,
        }
    }
}

/// Cache of stop-visit enumerations.
pub struct BoardCache {
    boards: MokaCache<BoardKey, BoardEntry>,
}

impl BoardCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let boards = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { boards }
    }

    /// Build the key for a window. Bounds are truncated to whole minutes.
    pub fn key(stop_id: &StopId, date: ServiceDate, window: TimeWindow, generation: u64) -> BoardKey {
        (
            stop_id.clone(),
            date,
            window.start.secs() / 60,
            window.end.secs() / 60,
            generation,
        )
    }

    /// Return the cached entry for `key`, computing and storing it on a miss.
    pub fn get_or_insert_with(&self, key: BoardKey, compute: impl FnOnce() -> Vec<StopVisit>) -> BoardEntry {
        self.boards.get_with(key, || Arc::new(compute()))
    }

    /// Approximate number of cached entries (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.boards.entry_count()
    }

    /// Invalidate all cached entries.
    pub fn invalidate_all(&self) {
        self.boards.invalidate_all();
    }
}
