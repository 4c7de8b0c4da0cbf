//! Test helpers for pinboard integration tests.
//!
//! Provides a board fixture over a fresh database, user creation, and
//! helpers for reading events off a subscribed outbound queue.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use pinboard::config::HubConfig;
use pinboard::hub::{ConnectionId, OutboundReceiver};
use pinboard::{
    BoardContext, BoardEvent, CacheCoordinator, Database, Hub, MemoryCache, NewUser, User,
    UserRepository,
};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A board context together with the cache backend behind it.
pub struct TestBoards {
    pub ctx: BoardContext,
    pub cache: Arc<MemoryCache>,
}

impl TestBoards {
    /// Build a context over an in-memory database.
    pub async fn in_memory() -> Self {
        Self::with_database(Database::open_in_memory().await.unwrap(), &HubConfig::default())
    }

    /// Build a context over a database file with a multi-connection pool.
    pub async fn on_disk(path: &Path, max_connections: u32) -> Self {
        let db = Database::open(path, max_connections).await.unwrap();
        Self::with_database(db, &HubConfig::default())
    }

    /// Build a context with custom hub queue sizes.
    pub async fn with_hub(config: &HubConfig) -> Self {
        Self::with_database(Database::open_in_memory().await.unwrap(), config)
    }

    fn with_database(db: Database, hub: &HubConfig) -> Self {
        let cache = Arc::new(MemoryCache::new());
        let ctx = BoardContext::new(
            Arc::new(db),
            Arc::new(CacheCoordinator::new(cache.clone())),
            Hub::spawn(hub),
        );
        Self { ctx, cache }
    }

    /// Create a user named `name`.
    pub async fn create_user(&self, name: &str) -> User {
        UserRepository::new(self.ctx.db().pool())
            .create(&NewUser::new(name, format!("{name}@example.com")))
            .await
            .unwrap()
    }

    /// Subscribe a bare outbound queue to a board.
    pub async fn subscribe(&self, board_id: i64) -> (ConnectionId, OutboundReceiver) {
        let id = ConnectionId::new();
        let (tx, rx) = self.ctx.hub().outbound_channel();
        self.ctx.hub().subscribe(board_id, id, tx).await;
        (id, rx)
    }
}

/// Receive the next event, failing the test if none arrives in time.
pub async fn next_event(rx: &mut OutboundReceiver) -> BoardEvent {
    let message = timeout(DEFAULT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("outbound queue closed");
    serde_json::from_str(&message).unwrap()
}

/// Assert that no event is waiting once the hub has drained its intake.
pub async fn assert_no_event(boards: &TestBoards, rx: &mut OutboundReceiver) {
    // A count round-trip orders after every earlier broadcast.
    boards.ctx.hub().subscriber_count(0).await;
    assert!(rx.try_recv().is_err(), "unexpected event queued");
}
