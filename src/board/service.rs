//! Board service for pinboard.
//!
//! This module provides high-level board operations with built-in access
//! checks, cache-aside snapshot reads, and change notification. Every
//! mutation follows the same order: the store commits, the board's cached
//! snapshot is invalidated, then the event is broadcast to the board's
//! subscribers.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use super::card_service::CardService;
use super::list_service::ListService;
use super::card_repository::fetch_cards_by_list;
use super::list_repository::fetch_board_lists;
use super::repository::{fetch_board, BoardRepository};
use super::types::{Board, NewBoard};
use crate::cache::CacheCoordinator;
use crate::db::{Database, User, UserRepository};
use crate::hub::{BoardEvent, EventKind, Hub};
use crate::{PinboardError, Result};

/// Broadcast an event to a board without touching the cache.
pub(crate) async fn announce<T: Serialize>(hub: &Hub, board_id: i64, kind: EventKind, payload: &T) {
    match BoardEvent::new(kind, payload) {
        Ok(event) => hub.broadcast(board_id, &event).await,
        Err(e) => warn!("Failed to build {} event for board {}: {}", kind, board_id, e),
    }
}

/// Invalidate a board's snapshot, then broadcast an event to it.
pub(crate) async fn publish<T: Serialize>(
    cache: &CacheCoordinator,
    hub: &Hub,
    board_id: i64,
    kind: EventKind,
    payload: &T,
) {
    cache.invalidate(board_id).await;
    announce(hub, board_id, kind, payload).await;
}

/// Fail with `AccessDenied` unless the user owns or is a member of the board.
///
/// A board that does not exist is denied the same way.
pub(crate) async fn ensure_access(db: &Database, board_id: i64, user_id: i64) -> Result<()> {
    let allowed = BoardRepository::new(db.pool())
        .is_member_or_owner(board_id, user_id)
        .await?;
    if !allowed {
        return Err(PinboardError::AccessDenied(format!("board {}", board_id)));
    }
    Ok(())
}

/// Shared collaborators of the board, list and card services.
#[derive(Debug, Clone)]
pub struct BoardContext {
    db: Arc<Database>,
    cache: Arc<CacheCoordinator>,
    hub: Hub,
}

impl BoardContext {
    /// Bundle the store, snapshot cache and hub.
    pub fn new(db: Arc<Database>, cache: Arc<CacheCoordinator>, hub: Hub) -> Self {
        Self { db, cache, hub }
    }

    /// Get the database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Get the cache coordinator.
    pub fn cache(&self) -> &CacheCoordinator {
        &self.cache
    }

    /// Get the hub handle.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Board operations.
    pub fn boards(&self) -> BoardService<'_> {
        BoardService::new(&self.db, &self.cache, &self.hub)
    }

    /// List operations.
    pub fn lists(&self) -> ListService<'_> {
        ListService::new(&self.db, &self.cache, &self.hub)
    }

    /// Card operations.
    pub fn cards(&self) -> CardService<'_> {
        CardService::new(&self.db, &self.cache, &self.hub)
    }
}

/// Board service for high-level board operations.
pub struct BoardService<'a> {
    db: &'a Database,
    cache: &'a CacheCoordinator,
    hub: &'a Hub,
}

impl<'a> BoardService<'a> {
    /// Create a new BoardService.
    pub fn new(db: &'a Database, cache: &'a CacheCoordinator, hub: &'a Hub) -> Self {
        Self { db, cache, hub }
    }

    /// Check that a user may see and change a board.
    pub async fn ensure_access(&self, board_id: i64, user_id: i64) -> Result<()> {
        ensure_access(self.db, board_id, user_id).await
    }

    /// Get a board the user owns, or fail with `AccessDenied`.
    async fn require_owner(&self, board_id: i64, user_id: i64) -> Result<Board> {
        let board = BoardRepository::new(self.db.pool())
            .get_by_id(board_id)
            .await?
            .ok_or_else(|| PinboardError::AccessDenied(format!("board {}", board_id)))?;
        if board.owner_id != user_id {
            return Err(PinboardError::AccessDenied(format!(
                "only the owner can manage board {}",
                board_id
            )));
        }
        Ok(board)
    }

    /// Create a board owned by `owner_id`.
    pub async fn create_board(&self, owner_id: i64, new_board: &NewBoard) -> Result<Board> {
        new_board.validate()?;
        let board = BoardRepository::new(self.db.pool())
            .create(owner_id, new_board)
            .await?;
        info!("User {} created board {}", owner_id, board.id);
        Ok(board)
    }

    /// Get the full snapshot of a board: lists by position, each with its
    /// cards by position.
    ///
    /// The cache is consulted first, but access is always checked against
    /// the store, so a cached snapshot is never returned to a user who has
    /// since lost access. On a miss the snapshot is assembled from the store
    /// and written back on a best-effort basis.
    pub async fn get_board(&self, board_id: i64, user_id: i64) -> Result<Board> {
        if let Some(board) = self.cache.lookup(board_id).await {
            self.ensure_access(board_id, user_id).await?;
            return Ok(board);
        }

        self.ensure_access(board_id, user_id).await?;

        let generation = self.cache.generation(board_id).await;
        let board = self.load_snapshot(board_id).await?;
        self.cache.store_if_current(&board, generation).await;
        Ok(board)
    }

    /// Assemble a board snapshot from the store.
    ///
    /// The board, its lists and their cards are read in one snapshot
    /// transaction, so a concurrent commit is either wholly in or wholly out.
    async fn load_snapshot(&self, board_id: i64) -> Result<Board> {
        let mut tx = self.db.begin_snapshot().await?;

        let mut board = fetch_board(&mut *tx, board_id)
            .await?
            .ok_or_else(|| PinboardError::NotFound("board".to_string()))?;
        let mut lists = fetch_board_lists(&mut *tx, board_id).await?;
        let list_ids: Vec<i64> = lists.iter().map(|l| l.id).collect();
        let mut cards = fetch_cards_by_list(&mut *tx, &list_ids).await?;

        tx.commit().await?;

        for list in &mut lists {
            list.cards = cards.remove(&list.id).unwrap_or_default();
        }
        board.lists = lists;
        Ok(board)
    }

    /// List the boards a user owns or belongs to, newest first.
    pub async fn list_boards(&self, user_id: i64) -> Result<Vec<Board>> {
        BoardRepository::new(self.db.pool())
            .list_for_user(user_id)
            .await
    }

    /// Rename a board. Owner only.
    pub async fn rename_board(&self, board_id: i64, user_id: i64, name: &str) -> Result<Board> {
        NewBoard::new(name).validate()?;
        self.require_owner(board_id, user_id).await?;

        let board = BoardRepository::new(self.db.pool())
            .rename(board_id, name)
            .await?
            .ok_or_else(|| PinboardError::NotFound("board".to_string()))?;

        publish(self.cache, self.hub, board_id, EventKind::BoardUpdated, &board).await;
        Ok(board)
    }

    /// Delete a board with all its lists and cards. Owner only.
    ///
    /// Subscribers receive `BOARD_DELETED` and are then disconnected.
    pub async fn delete_board(&self, board_id: i64, user_id: i64) -> Result<()> {
        self.require_owner(board_id, user_id).await?;

        let deleted = BoardRepository::new(self.db.pool()).delete(board_id).await?;
        if !deleted {
            return Err(PinboardError::NotFound("board".to_string()));
        }

        self.cache.forget(board_id).await;
        announce(
            self.hub,
            board_id,
            EventKind::BoardDeleted,
            &json!({ "id": board_id }),
        )
        .await;
        self.hub.close_board(board_id).await;

        info!("User {} deleted board {}", user_id, board_id);
        Ok(())
    }

    /// Invite a user to a board by email. Owner only.
    ///
    /// Inviting an existing member succeeds without a change.
    pub async fn add_member(&self, board_id: i64, owner_id: i64, email: &str) -> Result<User> {
        self.require_owner(board_id, owner_id).await?;

        let invitee = UserRepository::new(self.db.pool())
            .get_by_email(email)
            .await?
            .ok_or_else(|| PinboardError::NotFound(format!("user with email {}", email)))?;

        let added = BoardRepository::new(self.db.pool())
            .add_member(board_id, invitee.id)
            .await?;
        if added {
            publish(self.cache, self.hub, board_id, EventKind::MemberAdded, &invitee).await;
        }
        Ok(invitee)
    }

    /// Remove a member from a board. Owner only; the owner cannot be removed.
    pub async fn remove_member(&self, board_id: i64, owner_id: i64, member_id: i64) -> Result<()> {
        let board = self.require_owner(board_id, owner_id).await?;
        if member_id == board.owner_id {
            return Err(PinboardError::Validation(
                "the board owner cannot be removed".to_string(),
            ));
        }

        let removed = BoardRepository::new(self.db.pool())
            .remove_member(board_id, member_id)
            .await?;
        if !removed {
            return Err(PinboardError::NotFound("member".to_string()));
        }

        publish(
            self.cache,
            self.hub,
            board_id,
            EventKind::MemberRemoved,
            &json!({ "board_id": board_id, "user_id": member_id }),
        )
        .await;
        Ok(())
    }

    /// List the members of a board.
    pub async fn list_members(&self, board_id: i64, user_id: i64) -> Result<Vec<User>> {
        self.ensure_access(board_id, user_id).await?;
        BoardRepository::new(self.db.pool())
            .list_members(board_id)
            .await
    }
}
