//! Card operations with access checks and change notification.

use serde_json::json;
use validator::Validate;

use super::card_repository::CardRepository;
use super::list_repository::ListRepository;
use super::service::{announce, ensure_access, publish};
use super::types::{Card, CardUpdate, List, MoveRequest, MovedItem, NewCard};
use crate::cache::CacheCoordinator;
use crate::db::Database;
use crate::hub::{EventKind, Hub};
use crate::{PinboardError, Result};

/// Card service.
pub struct CardService<'a> {
    db: &'a Database,
    cache: &'a CacheCoordinator,
    hub: &'a Hub,
}

impl<'a> CardService<'a> {
    /// Create a new CardService.
    pub fn new(db: &'a Database, cache: &'a CacheCoordinator, hub: &'a Hub) -> Self {
        Self { db, cache, hub }
    }

    async fn get_list(&self, list_id: i64) -> Result<List> {
        ListRepository::new(self.db.pool())
            .get_by_id(list_id)
            .await?
            .ok_or_else(|| PinboardError::NotFound("list".to_string()))
    }

    async fn fetch_card(&self, card_id: i64) -> Result<Card> {
        CardRepository::new(self.db.pool())
            .get_by_id(card_id)
            .await?
            .ok_or_else(|| PinboardError::NotFound("card".to_string()))
    }

    /// Resolve a card and the board it belongs to, checking access.
    async fn authorize_card(&self, card_id: i64, user_id: i64) -> Result<(Card, i64)> {
        let card = self.fetch_card(card_id).await?;
        let list = self.get_list(card.list_id).await?;
        ensure_access(self.db, list.board_id, user_id).await?;
        Ok((card, list.board_id))
    }

    /// Get a single card.
    pub async fn get_card(&self, card_id: i64, user_id: i64) -> Result<Card> {
        Ok(self.authorize_card(card_id, user_id).await?.0)
    }

    /// Append a card to a list.
    pub async fn create_card(&self, list_id: i64, user_id: i64, new_card: &NewCard) -> Result<Card> {
        new_card.validate()?;
        let list = self.get_list(list_id).await?;
        ensure_access(self.db, list.board_id, user_id).await?;

        let card = CardRepository::new(self.db.pool())
            .create(list_id, new_card)
            .await?;

        publish(self.cache, self.hub, list.board_id, EventKind::CardCreated, &card).await;
        Ok(card)
    }

    /// Change a card's title and/or description.
    pub async fn update_card(&self, card_id: i64, user_id: i64, update: &CardUpdate) -> Result<Card> {
        update.validate()?;
        let (_, board_id) = self.authorize_card(card_id, user_id).await?;

        let card = CardRepository::new(self.db.pool())
            .update(card_id, update)
            .await?
            .ok_or_else(|| PinboardError::NotFound("card".to_string()))?;

        if !update.is_empty() {
            publish(self.cache, self.hub, board_id, EventKind::CardUpdated, &card).await;
        }
        Ok(card)
    }

    /// Move a card to a position in the same or another list.
    ///
    /// Access is checked inside the move against the boards the card is
    /// actually leaving and entering. If those differ, both are invalidated
    /// and both are notified.
    pub async fn move_card(&self, user_id: i64, request: &MoveRequest) -> Result<MovedItem<Card>> {
        let outcome = CardRepository::new(self.db.pool())
            .move_card(
                user_id,
                request.item_id,
                request.new_container_id,
                request.new_position,
            )
            .await?;

        let moved = MovedItem {
            item: self.fetch_card(request.item_id).await?,
            from_container_id: outcome.plan.from_container,
            from_position: outcome.plan.from_position,
        };

        let boards = outcome.boards();
        for board_id in &boards {
            self.cache.invalidate(*board_id).await;
        }
        for board_id in &boards {
            announce(self.hub, *board_id, EventKind::CardMoved, &moved).await;
        }
        Ok(moved)
    }

    /// Delete a card.
    pub async fn delete_card(&self, card_id: i64, user_id: i64) -> Result<()> {
        let (_, board_id) = self.authorize_card(card_id, user_id).await?;

        let removed = CardRepository::new(self.db.pool()).delete(card_id).await?;

        publish(
            self.cache,
            self.hub,
            board_id,
            EventKind::CardDeleted,
            &json!({ "id": card_id, "list_id": removed.container_id }),
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::board::{BoardContext, NewBoard, NewList};
    use crate::cache::{board_key, Cache, MemoryCache};
    use crate::config::HubConfig;
    use crate::db::{NewUser, User, UserRepository};
    use crate::hub::{BoardEvent, ConnectionId};

    struct Fixture {
        ctx: BoardContext,
        cache: Arc<MemoryCache>,
        owner: User,
        other: User,
        board_id: i64,
        l1: i64,
        l2: i64,
    }

    async fn setup() -> Fixture {
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
        let cache = Arc::new(MemoryCache::new());
        let ctx = BoardContext::new(
            db,
            Arc::new(CacheCoordinator::new(cache.clone())),
            Hub::spawn(&HubConfig::default()),
        );
        let board = ctx
            .boards()
            .create_board(owner.id, &NewBoard::new("b"))
            .await
            .unwrap();
        let l1 = ctx
            .lists()
            .create_list(board.id, owner.id, &NewList::new("l1"))
            .await
            .unwrap()
            .id;
        let l2 = ctx
            .lists()
            .create_list(board.id, owner.id, &NewList::new("l2"))
            .await
            .unwrap()
            .id;
        Fixture {
            ctx,
            cache,
            owner,
            other,
            board_id: board.id,
            l1,
            l2,
        }
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let f = setup().await;
        let cards = f.ctx.cards();
        let (tx, mut rx) = f.ctx.hub().outbound_channel();
        f.ctx.hub().subscribe(f.board_id, ConnectionId::new(), tx).await;

        let card = cards
            .create_card(f.l1, f.owner.id, &NewCard::new("c"))
            .await
            .unwrap();
        let updated = cards
            .update_card(card.id, f.owner.id, &CardUpdate::new().description("d"))
            .await
            .unwrap();
        assert_eq!(updated.description, "d");
        cards.delete_card(card.id, f.owner.id).await.unwrap();

        let kinds: Vec<EventKind> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(|m| serde_json::from_str::<BoardEvent>(m).unwrap().event)
        .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::CardCreated,
                EventKind::CardUpdated,
                EventKind::CardDeleted
            ]
        );
    }

    #[tokio::test]
    async fn test_non_member_is_rejected_without_side_effects() {
        let f = setup().await;
        let cards = f.ctx.cards();
        let card = cards
            .create_card(f.l1, f.owner.id, &NewCard::new("c"))
            .await
            .unwrap();
        f.ctx.boards().get_board(f.board_id, f.owner.id).await.unwrap();

        assert!(matches!(
            cards.create_card(f.l1, f.other.id, &NewCard::new("x")).await,
            Err(PinboardError::AccessDenied(_))
        ));
        assert!(matches!(
            cards
                .move_card(f.other.id, &MoveRequest::new(card.id, f.l2, 1.0))
                .await,
            Err(PinboardError::AccessDenied(_))
        ));
        assert!(matches!(
            cards.get_card(card.id, f.other.id).await,
            Err(PinboardError::AccessDenied(_))
        ));

        // Rejections happen before the store or cache is touched.
        assert!(f.cache.get(&board_key(f.board_id)).await.unwrap().is_some());
        assert_eq!(cards.get_card(card.id, f.owner.id).await.unwrap().list_id, f.l1);
    }

    #[tokio::test]
    async fn test_move_card_invalidates_and_broadcasts() {
        let f = setup().await;
        let cards = f.ctx.cards();
        let card = cards
            .create_card(f.l1, f.owner.id, &NewCard::new("c"))
            .await
            .unwrap();
        f.ctx.boards().get_board(f.board_id, f.owner.id).await.unwrap();

        let (tx, mut rx) = f.ctx.hub().outbound_channel();
        f.ctx.hub().subscribe(f.board_id, ConnectionId::new(), tx).await;

        let moved = cards
            .move_card(f.owner.id, &MoveRequest::new(card.id, f.l2, 1.0))
            .await
            .unwrap();
        assert_eq!(moved.item.list_id, f.l2);
        assert_eq!(moved.from_container_id, f.l1);
        assert!(f.cache.get(&board_key(f.board_id)).await.unwrap().is_none());

        let event: BoardEvent = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(event.event, EventKind::CardMoved);
        assert_eq!(event.payload["item"]["list_id"], f.l2);
    }

    #[tokio::test]
    async fn test_move_card_between_boards() {
        let f = setup().await;
        let cards = f.ctx.cards();
        let card = cards
            .create_card(f.l1, f.owner.id, &NewCard::new("c"))
            .await
            .unwrap();
        let far_board = f
            .ctx
            .boards()
            .create_board(f.owner.id, &NewBoard::new("far"))
            .await
            .unwrap();
        let far_list = f
            .ctx
            .lists()
            .create_list(far_board.id, f.owner.id, &NewList::new("inbox"))
            .await
            .unwrap();

        for board_id in [f.board_id, far_board.id] {
            f.ctx.boards().get_board(board_id, f.owner.id).await.unwrap();
            assert!(f.cache.get(&board_key(board_id)).await.unwrap().is_some());
        }
        let (near_tx, mut near_rx) = f.ctx.hub().outbound_channel();
        f.ctx.hub().subscribe(f.board_id, ConnectionId::new(), near_tx).await;
        let (far_tx, mut far_rx) = f.ctx.hub().outbound_channel();
        f.ctx.hub().subscribe(far_board.id, ConnectionId::new(), far_tx).await;

        let moved = cards
            .move_card(f.owner.id, &MoveRequest::new(card.id, far_list.id, 1.0))
            .await
            .unwrap();
        assert_eq!(moved.item.list_id, far_list.id);
        assert_eq!(moved.from_container_id, f.l1);

        for board_id in [f.board_id, far_board.id] {
            assert!(f.cache.get(&board_key(board_id)).await.unwrap().is_none());
        }
        for rx in [&mut near_rx, &mut far_rx] {
            let event: BoardEvent = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(event.event, EventKind::CardMoved);
            assert_eq!(event.payload["item"]["list_id"], far_list.id);
        }

        // Moving it back reports the board it is actually leaving.
        f.ctx.boards().get_board(far_board.id, f.owner.id).await.unwrap();
        let back = cards
            .move_card(f.owner.id, &MoveRequest::new(card.id, f.l2, 1.0))
            .await
            .unwrap();
        assert_eq!(back.from_container_id, far_list.id);
        assert!(f.cache.get(&board_key(far_board.id)).await.unwrap().is_none());
        let event: BoardEvent = serde_json::from_str(&far_rx.recv().await.unwrap()).unwrap();
        assert_eq!(event.event, EventKind::CardMoved);
        assert_eq!(event.payload["from_container_id"], far_list.id);
    }

    #[tokio::test]
    async fn test_move_into_missing_list() {
        let f = setup().await;
        let card = f
            .ctx
            .cards()
            .create_card(f.l1, f.owner.id, &NewCard::new("c"))
            .await
            .unwrap();
        assert!(matches!(
            f.ctx
                .cards()
                .move_card(f.owner.id, &MoveRequest::new(card.id, 999, 1.0))
                .await,
            Err(PinboardError::NotFound(_))
        ));
    }
}
