//! Board snapshot cache.
//!
//! The cache holds serialized full-board snapshots keyed by `board:<id>`. It
//! is never authoritative: reads still authorize against the store, writes
//! invalidate after commit, and every entry expires after its TTL.
//!
//! Backends implement [`Cache`]; [`CacheCoordinator`] is the policy layer the
//! board services go through.

mod coordinator;
mod memory;

pub use coordinator::CacheCoordinator;
pub use memory::{DisabledCache, MemoryCache};

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Lifetime of a cached board snapshot.
pub const BOARD_TTL: Duration = Duration::from_secs(600);

/// Cache key for a board snapshot.
pub fn board_key(board_id: i64) -> String {
    format!("board:{}", board_id)
}

/// A key/value store with per-entry expiry.
///
/// Failures are reported as [`crate::PinboardError::Cache`]; callers treat
/// them as misses.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get the value stored under `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
