//! List operations with access checks and change notification.

use serde_json::json;
use validator::Validate;

use super::list_repository::ListRepository;
use super::service::{announce, ensure_access, publish};
use super::types::{List, MoveRequest, MovedItem, NewList};
use crate::cache::CacheCoordinator;
use crate::db::Database;
use crate::hub::{EventKind, Hub};
use crate::{PinboardError, Result};

/// List service.
pub struct ListService<'a> {
    db: &'a Database,
    cache: &'a CacheCoordinator,
    hub: &'a Hub,
}

impl<'a> ListService<'a> {
    /// Create a new ListService.
    pub fn new(db: &'a Database, cache: &'a CacheCoordinator, hub: &'a Hub) -> Self {
        Self { db, cache, hub }
    }

    async fn get_list(&self, list_id: i64) -> Result<List> {
        ListRepository::new(self.db.pool())
            .get_by_id(list_id)
            .await?
            .ok_or_else(|| PinboardError::NotFound("list".to_string()))
    }

    /// Append a list to a board.
    pub async fn create_list(&self, board_id: i64, user_id: i64, new_list: &NewList) -> Result<List> {
        new_list.validate()?;
        ensure_access(self.db, board_id, user_id).await?;

        let list = ListRepository::new(self.db.pool())
            .create(board_id, new_list)
            .await?;

        publish(self.cache, self.hub, board_id, EventKind::ListCreated, &list).await;
        Ok(list)
    }

    /// Rename a list.
    pub async fn rename_list(&self, list_id: i64, user_id: i64, title: &str) -> Result<List> {
        NewList::new(title).validate()?;
        let list = self.get_list(list_id).await?;
        ensure_access(self.db, list.board_id, user_id).await?;

        let list = ListRepository::new(self.db.pool())
            .update_title(list_id, title)
            .await?
            .ok_or_else(|| PinboardError::NotFound("list".to_string()))?;

        publish(self.cache, self.hub, list.board_id, EventKind::ListUpdated, &list).await;
        Ok(list)
    }

    /// Move a list to a position on the same or another board.
    ///
    /// Moving to another board requires access to both, checked inside the
    /// move. Both boards are invalidated and both receive `LIST_MOVED`.
    pub async fn move_list(&self, user_id: i64, request: &MoveRequest) -> Result<MovedItem<List>> {
        let outcome = ListRepository::new(self.db.pool())
            .move_list(
                user_id,
                request.item_id,
                request.new_container_id,
                request.new_position,
            )
            .await?;

        let moved = MovedItem {
            item: self.get_list(request.item_id).await?,
            from_container_id: outcome.plan.from_container,
            from_position: outcome.plan.from_position,
        };

        let boards = outcome.boards();
        for board_id in &boards {
            self.cache.invalidate(*board_id).await;
        }
        for board_id in &boards {
            announce(self.hub, *board_id, EventKind::ListMoved, &moved).await;
        }
        Ok(moved)
    }

    /// Delete a list and its cards.
    pub async fn delete_list(&self, list_id: i64, user_id: i64) -> Result<()> {
        let list = self.get_list(list_id).await?;
        ensure_access(self.db, list.board_id, user_id).await?;

        let removed = ListRepository::new(self.db.pool()).delete(list_id).await?;

        publish(
            self.cache,
            self.hub,
            removed.container_id,
            EventKind::ListDeleted,
            &json!({ "id": list_id, "board_id": removed.container_id }),
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::board::{BoardContext, NewBoard};
    use crate::cache::MemoryCache;
    use crate::config::HubConfig;
    use crate::db::{NewUser, User, UserRepository};
    use crate::hub::{BoardEvent, ConnectionId, OutboundReceiver};

    async fn setup() -> (BoardContext, User, User) {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let users = UserRepository::new(db.pool());
        let owner = users
            .create(&NewUser::new("owner", "owner@example.com"))
            .await
            .unwrap();
        let other = users
            .create(&NewUser::new("other", "other@example.com"))
            .await
            .unwrap();
        let cache = Arc::new(CacheCoordinator::new(Arc::new(MemoryCache::new())));
        let hub = Hub::spawn(&HubConfig::default());
        (BoardContext::new(db, cache, hub), owner, other)
    }

    async fn watch(ctx: &BoardContext, board_id: i64) -> OutboundReceiver {
        let (tx, rx) = ctx.hub().outbound_channel();
        ctx.hub().subscribe(board_id, ConnectionId::new(), tx).await;
        rx
    }

    async fn next_event(rx: &mut OutboundReceiver) -> BoardEvent {
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_create_list_broadcasts() {
        let (ctx, owner, other) = setup().await;
        let board = ctx
            .boards()
            .create_board(owner.id, &NewBoard::new("b"))
            .await
            .unwrap();
        let mut rx = watch(&ctx, board.id).await;

        let list = ctx
            .lists()
            .create_list(board.id, owner.id, &NewList::new("Todo"))
            .await
            .unwrap();
        assert_eq!(list.position, 1.0);

        let event = next_event(&mut rx).await;
        assert_eq!(event.event, EventKind::ListCreated);
        assert_eq!(event.payload["id"], list.id);

        assert!(matches!(
            ctx.lists()
                .create_list(board.id, other.id, &NewList::new("x"))
                .await,
            Err(PinboardError::AccessDenied(_))
        ));
        assert!(matches!(
            ctx.lists()
                .create_list(board.id, owner.id, &NewList::new(""))
                .await,
            Err(PinboardError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_and_delete_list() {
        let (ctx, owner, other) = setup().await;
        let board = ctx
            .boards()
            .create_board(owner.id, &NewBoard::new("b"))
            .await
            .unwrap();
        let list = ctx
            .lists()
            .create_list(board.id, owner.id, &NewList::new("a"))
            .await
            .unwrap();
        let mut rx = watch(&ctx, board.id).await;

        assert!(matches!(
            ctx.lists().rename_list(list.id, other.id, "z").await,
            Err(PinboardError::AccessDenied(_))
        ));

        let renamed = ctx.lists().rename_list(list.id, owner.id, "b").await.unwrap();
        assert_eq!(renamed.title, "b");
        assert_eq!(next_event(&mut rx).await.event, EventKind::ListUpdated);

        ctx.lists().delete_list(list.id, owner.id).await.unwrap();
        let event = next_event(&mut rx).await;
        assert_eq!(event.event, EventKind::ListDeleted);
        assert_eq!(event.payload["id"], list.id);

        assert!(matches!(
            ctx.lists().delete_list(list.id, owner.id).await,
            Err(PinboardError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_move_list_between_boards() {
        let (ctx, owner, other) = setup().await;
        let source = ctx
            .boards()
            .create_board(owner.id, &NewBoard::new("source"))
            .await
            .unwrap();
        let target = ctx
            .boards()
            .create_board(owner.id, &NewBoard::new("target"))
            .await
            .unwrap();
        let foreign = ctx
            .boards()
            .create_board(other.id, &NewBoard::new("foreign"))
            .await
            .unwrap();

        let a = ctx
            .lists()
            .create_list(source.id, owner.id, &NewList::new("a"))
            .await
            .unwrap();
        ctx.lists()
            .create_list(source.id, owner.id, &NewList::new("b"))
            .await
            .unwrap();
        ctx.lists()
            .create_list(target.id, owner.id, &NewList::new("x"))
            .await
            .unwrap();

        assert!(matches!(
            ctx.lists()
                .move_list(owner.id, &MoveRequest::new(a.id, foreign.id, 1.0))
                .await,
            Err(PinboardError::AccessDenied(_))
        ));

        let mut source_rx = watch(&ctx, source.id).await;
        let mut target_rx = watch(&ctx, target.id).await;

        let moved = ctx
            .lists()
            .move_list(owner.id, &MoveRequest::new(a.id, target.id, 1.0))
            .await
            .unwrap();
        assert_eq!(moved.item.board_id, target.id);
        assert_eq!(moved.from_container_id, source.id);

        assert_eq!(next_event(&mut source_rx).await.event, EventKind::ListMoved);
        assert_eq!(next_event(&mut target_rx).await.event, EventKind::ListMoved);

        let source_snapshot = ctx.boards().get_board(source.id, owner.id).await.unwrap();
        let target_snapshot = ctx.boards().get_board(target.id, owner.id).await.unwrap();
        let layout = |b: &crate::board::Board| -> Vec<(String, f64)> {
            b.lists.iter().map(|l| (l.title.clone(), l.position)).collect()
        };
        assert_eq!(layout(&source_snapshot), vec![("b".to_string(), 1.0)]);
        assert_eq!(
            layout(&target_snapshot),
            vec![("a".to_string(), 1.0), ("x".to_string(), 2.0)]
        );
    }
}
