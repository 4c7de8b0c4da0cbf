//! Read-aside lookups and invalidation for board snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{board_key, Cache, BOARD_TTL};
use crate::board::Board;

/// Policy layer between the board services and a [`Cache`] backend.
///
/// Every mutation calls [`invalidate`](Self::invalidate) after its commit.
/// Reads that miss load the board from the store and write it back through
/// [`store_if_current`](Self::store_if_current), which refuses the write if
/// an invalidation for that board happened after the read took its
/// [`generation`](Self::generation). A slow read can therefore never put back
/// a snapshot that predates a committed mutation.
///
/// Cache failures never surface: they are logged and treated as misses.
pub struct CacheCoordinator {
    cache: Arc<dyn Cache>,
    ttl: Duration,
    generations: Mutex<Generations>,
}

/// Invalidation generations of live boards.
///
/// Values come from one clock, so a board whose entry was forgotten reports
/// `floor`, which is newer than anything a reader could have taken before
/// the board was forgotten.
#[derive(Debug, Default)]
struct Generations {
    clock: u64,
    floor: u64,
    boards: HashMap<i64, u64>,
}

impl Generations {
    fn get(&self, board_id: i64) -> u64 {
        self.boards.get(&board_id).copied().unwrap_or(self.floor)
    }

    fn bump(&mut self, board_id: i64) {
        self.clock += 1;
        self.boards.insert(board_id, self.clock);
    }

    fn forget(&mut self, board_id: i64) {
        self.clock += 1;
        self.floor = self.clock;
        self.boards.remove(&board_id);
    }
}

impl CacheCoordinator {
    /// Create a coordinator with the default snapshot TTL.
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self::with_ttl(cache, BOARD_TTL)
    }

    /// Create a coordinator with a custom snapshot TTL.
    pub fn with_ttl(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            generations: Mutex::new(Generations::default()),
        }
    }

    /// TTL applied to written snapshots.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a cached snapshot.
    ///
    /// Backend errors and undecodable entries count as misses.
    pub async fn lookup(&self, board_id: i64) -> Option<Board> {
        let key = board_key(board_id);
        let raw = match self.cache.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Err(e) => {
                warn!("Cache lookup for {} failed: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str::<Board>(&raw) {
            Ok(board) => {
                debug!("Cache hit for {}", key);
                Some(board)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Current invalidation generation of a board.
    ///
    /// Take this before loading a snapshot from the store.
    pub async fn generation(&self, board_id: i64) -> u64 {
        self.generations.lock().await.get(board_id)
    }

    /// Write a snapshot back unless the board was invalidated since
    /// `generation` was taken.
    ///
    /// Returns true if the snapshot was written.
    pub async fn store_if_current(&self, board: &Board, generation: u64) -> bool {
        let key = board_key(board.id);
        let value = match serde_json::to_string(board) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize snapshot for {}: {}", key, e);
                return false;
            }
        };

        let generations = self.generations.lock().await;
        let current = generations.get(board.id);
        if current != generation {
            debug!(
                "Skipping write-back for {} (generation {} superseded by {})",
                key, generation, current
            );
            return false;
        }

        match self.cache.set(&key, value, self.ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache write-back for {} failed: {}", key, e);
                false
            }
        }
    }

    /// Drop a board's cached snapshot.
    ///
    /// Called after the mutation's transaction commits and before it reports
    /// success. A failed delete is logged; the entry still expires by TTL.
    pub async fn invalidate(&self, board_id: i64) {
        let key = board_key(board_id);
        let mut generations = self.generations.lock().await;
        generations.bump(board_id);

        match self.cache.delete(&key).await {
            Ok(()) => debug!("Invalidated {}", key),
            Err(e) => warn!("Cache invalidation for {} failed: {}", key, e),
        }
    }

    /// Drop everything held for a deleted board: its snapshot and its
    /// generation entry.
    ///
    /// Write-backs of reads that started before this call are still refused.
    pub async fn forget(&self, board_id: i64) {
        let key = board_key(board_id);
        let mut generations = self.generations.lock().await;
        generations.forget(board_id);

        match self.cache.delete(&key).await {
            Ok(()) => debug!("Forgot {}", key),
            Err(e) => warn!("Cache delete for forgotten {} failed: {}", key, e),
        }
    }

    /// Number of boards with a tracked generation.
    pub async fn tracked_boards(&self) -> usize {
        self.generations.lock().await.boards.len()
    }
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("ttl", &self.ttl)
            .finish()
    }
}
