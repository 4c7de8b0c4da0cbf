//! Card repository for pinboard.

use std::collections::HashMap;

use sqlx::QueryBuilder;

use super::ordering::CARDS;
use super::position::{MoveOutcome, Placement};
use super::types::{Card, CardUpdate, NewCard};
use crate::db::{Db, DbPool, SQL_NOW};
use crate::{PinboardError, Result};

const CARD_COLUMNS: &str = "id, title, description, position, list_id, created_at, updated_at";

/// Cards of several lists in one query, grouped per list, on any executor.
pub(crate) async fn fetch_cards_by_list<'e, E>(
    executor: E,
    list_ids: &[i64],
) -> Result<HashMap<i64, Vec<Card>>>
where
    E: sqlx::Executor<'e, Database = Db>,
{
    let mut grouped: HashMap<i64, Vec<Card>> = HashMap::new();
    if list_ids.is_empty() {
        return Ok(grouped);
    }

    let mut query: QueryBuilder<Db> =
        QueryBuilder::new(format!("SELECT {CARD_COLUMNS} FROM cards WHERE list_id IN ("));
    let mut separated = query.separated(", ");
    for id in list_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY list_id, position, id");

    let cards: Vec<Card> = query.build_query_as().fetch_all(executor).await?;
    for card in cards {
        grouped.entry(card.list_id).or_default().push(card);
    }
    Ok(grouped)
}

/// Repository for cards ordered within a list.
pub struct CardRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> CardRepository<'a> {
    /// Create a new CardRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Append a new card to the end of a list.
    pub async fn create(&self, list_id: i64, new_card: &NewCard) -> Result<Card> {
        let mut tx = self.pool.begin().await?;

        CARDS.lock_container(&mut tx, list_id).await?;
        let position = CARDS.next_position(&mut tx, list_id).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO cards (title, description, position, list_id)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&new_card.title)
        .bind(&new_card.description)
        .bind(position)
        .bind(list_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| PinboardError::NotFound("card".to_string()))
    }

    /// Get a card by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Card>> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = $1");
        let card = sqlx::query_as::<_, Card>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(card)
    }

    /// Fetch the cards of several lists in one query.
    ///
    /// Cards are grouped by list and ordered by ascending position within
    /// each group. Lists without cards have no entry in the map.
    pub async fn list_by_list_ids(&self, list_ids: &[i64]) -> Result<HashMap<i64, Vec<Card>>> {
        fetch_cards_by_list(self.pool, list_ids).await
    }

    /// Cards of a single list in ascending position order.
    pub async fn list_by_list(&self, list_id: i64) -> Result<Vec<Card>> {
        let mut grouped = self.list_by_list_ids(&[list_id]).await?;
        Ok(grouped.remove(&list_id).unwrap_or_default())
    }

    /// Highest card position in a list, or None if the list is empty.
    pub async fn max_position(&self, list_id: i64) -> Result<Option<f64>> {
        let mut conn = self.pool.acquire().await?;
        CARDS.max_position(&mut conn, list_id).await
    }

    /// Update a card's title and/or description.
    ///
    /// Returns the updated card, or None if not found.
    pub async fn update(&self, id: i64, update: &CardUpdate) -> Result<Option<Card>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<Db> = QueryBuilder::new("UPDATE cards SET ");
        let mut separated = query.separated(", ");
        if let Some(ref title) = update.title {
            separated.push("title = ");
            separated.push_bind_unseparated(title);
        }
        if let Some(ref description) = update.description {
            separated.push("description = ");
            separated.push_bind_unseparated(description);
        }
        separated.push(format!("updated_at = {SQL_NOW}"));
        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Delete a card, closing the gap in its list.
    pub async fn delete(&self, id: i64) -> Result<Placement> {
        CARDS.remove_item(self.pool, id).await
    }

    /// Move a card to `new_position` in `new_list_id` for `actor_id`.
    ///
    /// Access to the boards on both sides is checked inside the move's
    /// transaction; a refusal rolls everything back.
    pub async fn move_card(
        &self,
        actor_id: i64,
        id: i64,
        new_list_id: i64,
        new_position: f64,
    ) -> Result<MoveOutcome> {
        CARDS
            .move_item(self.pool, actor_id, id, new_list_id, new_position)
            .await
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::board::{BoardRepository, ListRepository, NewBoard, NewList};
    use crate::db::{NewUser, UserRepository};
    use crate::Database;

    struct Fixture {
        db: Database,
        owner: i64,
        l1: i64,
        l2: i64,
    }

    async fn setup() -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("owner", "owner@example.com"))
            .await
            .unwrap();
        let board = BoardRepository::new(db.pool())
            .create(user.id, &NewBoard::new("board"))
            .await
            .unwrap();
        let lists = ListRepository::new(db.pool());
        let l1 = lists.create(board.id, &NewList::new("l1")).await.unwrap().id;
        let l2 = lists.create(board.id, &NewList::new("l2")).await.unwrap().id;
        Fixture {
            db,
            owner: user.id,
            l1,
            l2,
        }
    }

    async fn fill(repo: &CardRepository<'_>, list_id: i64, titles: &[&str]) -> Vec<Card> {
        let mut cards = Vec::new();
        for title in titles {
            cards.push(repo.create(list_id, &NewCard::new(*title)).await.unwrap());
        }
        cards
    }

    fn layout(cards: &[Card]) -> Vec<(String, f64)> {
        cards.iter().map(|c| (c.title.clone(), c.position)).collect()
    }

    #[tokio::test]
    async fn test_create_appends() {
        let f = setup().await;
        let repo = CardRepository::new(f.db.pool());

        let cards = fill(&repo, f.l1, &["a", "b"]).await;
        assert_eq!(cards[0].position, 1.0);
        assert_eq!(cards[1].position, 2.0);
        assert_eq!(cards[0].description, "");
        assert_eq!(repo.max_position(f.l1).await.unwrap(), Some(2.0));
        assert_eq!(repo.max_position(f.l2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_on_missing_list() {
        let f = setup().await;
        let repo = CardRepository::new(f.db.pool());
        let result = repo.create(999, &NewCard::new("x")).await;
        assert!(matches!(result, Err(PinboardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_list_ids_groups_and_orders() {
        let f = setup().await;
        let repo = CardRepository::new(f.db.pool());
        fill(&repo, f.l1, &["a", "b", "c"]).await;
        fill(&repo, f.l2, &["x"]).await;

        let c = repo.list_by_list(f.l1).await.unwrap()[2].clone();
        repo.move_card(f.owner, c.id, f.l1, 1.0).await.unwrap();

        let grouped = repo.list_by_list_ids(&[f.l1, f.l2, 999]).await.unwrap();
        assert_eq!(grouped.len(), 2);
        let l1: Vec<&str> = grouped[&f.l1].iter().map(|c| c.title.as_str()).collect();
        assert_eq!(l1, vec!["c", "a", "b"]);
        assert_eq!(grouped[&f.l2].len(), 1);

        assert!(repo.list_by_list_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update() {
        let f = setup().await;
        let repo = CardRepository::new(f.db.pool());
        let card = repo
            .create(f.l1, &NewCard::new("title").with_description("desc"))
            .await
            .unwrap();

        let updated = repo
            .update(card.id, &CardUpdate::new().description("more"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "title");
        assert_eq!(updated.description, "more");

        let unchanged = repo.update(card.id, &CardUpdate::new()).await.unwrap().unwrap();
        assert_eq!(unchanged.description, "more");

        assert!(repo
            .update(999, &CardUpdate::new().title("t"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_move_card_across_lists() {
        let f = setup().await;
        let repo = CardRepository::new(f.db.pool());
        let source = fill(&repo, f.l1, &["a", "b", "c"]).await;
        fill(&repo, f.l2, &["x", "y"]).await;

        let outcome = repo
            .move_card(f.owner, source[1].id, f.l2, 2.0)
            .await
            .unwrap();
        assert_eq!(outcome.plan.from_container, f.l1);
        assert_eq!(outcome.plan.from_position, 2.0);
        assert_eq!(outcome.boards(), vec![outcome.from_board]);

        let l1 = repo.list_by_list(f.l1).await.unwrap();
        let l2 = repo.list_by_list(f.l2).await.unwrap();
        assert_eq!(
            layout(&l1),
            vec![("a".to_string(), 1.0), ("c".to_string(), 2.0)]
        );
        assert_eq!(
            layout(&l2),
            vec![
                ("x".to_string(), 1.0),
                ("b".to_string(), 2.0),
                ("y".to_string(), 3.0)
            ]
        );
    }

    #[tokio::test]
    async fn test_move_to_own_position_changes_nothing() {
        let f = setup().await;
        let repo = CardRepository::new(f.db.pool());
        let cards = fill(&repo, f.l1, &["a", "b", "c"]).await;
        let before = layout(&repo.list_by_list(f.l1).await.unwrap());

        repo.move_card(f.owner, cards[1].id, f.l1, 2.0).await.unwrap();
        assert_eq!(layout(&repo.list_by_list(f.l1).await.unwrap()), before);
    }

    #[tokio::test]
    async fn test_move_rejects_bad_input() {
        let f = setup().await;
        let repo = CardRepository::new(f.db.pool());
        let cards = fill(&repo, f.l1, &["a"]).await;

        assert!(matches!(
            repo.move_card(f.owner, 999, f.l1, 1.0).await,
            Err(PinboardError::NotFound(_))
        ));
        assert!(matches!(
            repo.move_card(f.owner, cards[0].id, f.l1, f64::NAN).await,
            Err(PinboardError::Validation(_))
        ));
        assert!(matches!(
            repo.move_card(f.owner, cards[0].id, f.l1, 1.5).await,
            Err(PinboardError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_move_rolls_back() {
        let f = setup().await;
        let repo = CardRepository::new(f.db.pool());
        let cards = fill(&repo, f.l1, &["a", "b", "c"]).await;
        let before = layout(&repo.list_by_list(f.l1).await.unwrap());

        let result = repo.move_card(f.owner, cards[0].id, 999, 1.0).await;
        assert!(matches!(result, Err(PinboardError::NotFound(_))));
        assert_eq!(layout(&repo.list_by_list(f.l1).await.unwrap()), before);
    }

    #[tokio::test]
    async fn test_move_checks_access_to_both_boards() {
        let f = setup().await;
        let repo = CardRepository::new(f.db.pool());
        let cards = fill(&repo, f.l1, &["a", "b"]).await;

        let stranger = UserRepository::new(f.db.pool())
            .create(&NewUser::new("stranger", "stranger@example.com"))
            .await
            .unwrap();
        let theirs = BoardRepository::new(f.db.pool())
            .create(stranger.id, &NewBoard::new("theirs"))
            .await
            .unwrap();
        let their_list = ListRepository::new(f.db.pool())
            .create(theirs.id, &NewList::new("inbox"))
            .await
            .unwrap();
        let before = layout(&repo.list_by_list(f.l1).await.unwrap());

        // Pulling a card off a board the actor cannot see.
        assert!(matches!(
            repo.move_card(stranger.id, cards[0].id, their_list.id, 1.0)
                .await,
            Err(PinboardError::AccessDenied(_))
        ));
        // Pushing a card onto a board the actor cannot see.
        assert!(matches!(
            repo.move_card(f.owner, cards[0].id, their_list.id, 1.0).await,
            Err(PinboardError::AccessDenied(_))
        ));

        assert_eq!(layout(&repo.list_by_list(f.l1).await.unwrap()), before);
        assert!(repo.list_by_list(their_list.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_reports_boards_it_touched() {
        let f = setup().await;
        let repo = CardRepository::new(f.db.pool());
        let card = fill(&repo, f.l1, &["a"]).await.remove(0);

        let board_id = ListRepository::new(f.db.pool())
            .get_by_id(f.l1)
            .await
            .unwrap()
            .unwrap()
            .board_id;
        let other = BoardRepository::new(f.db.pool())
            .create(f.owner, &NewBoard::new("other"))
            .await
            .unwrap();
        let far = ListRepository::new(f.db.pool())
            .create(other.id, &NewList::new("far"))
            .await
            .unwrap();

        let away = repo.move_card(f.owner, card.id, far.id, 1.0).await.unwrap();
        assert_eq!(away.boards(), vec![board_id, other.id]);

        let back = repo.move_card(f.owner, card.id, f.l2, 1.0).await.unwrap();
        assert_eq!(back.plan.from_container, far.id);
        assert_eq!(back.boards(), vec![other.id, board_id]);
    }

    #[tokio::test]
    async fn test_delete_closes_gap() {
        let f = setup().await;
        let repo = CardRepository::new(f.db.pool());
        let cards = fill(&repo, f.l1, &["a", "b", "c"]).await;

        repo.delete(cards[1].id).await.unwrap();
        assert_eq!(
            layout(&repo.list_by_list(f.l1).await.unwrap()),
            vec![("a".to_string(), 1.0), ("c".to_string(), 2.0)]
        );
        assert!(repo.get_by_id(cards[1].id).await.unwrap().is_none());
    }

    /// Whole-number targets mixed with half steps.
    fn target() -> impl Strategy<Value = f64> {
        prop_oneof![
            (0i64..6).prop_map(|p| p as f64),
            (0i64..6).prop_map(|p| p as f64 + 0.5),
        ]
    }

    fn assert_unique(cards: &[Card]) {
        let mut positions: Vec<f64> = cards.iter().map(|c| c.position).collect();
        let len = positions.len();
        positions.dedup();
        assert_eq!(positions.len(), len, "duplicate positions: {:?}", layout(cards));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_stored_positions_stay_unique(
            moves in prop::collection::vec((0usize..5, any::<bool>(), target()), 1..10),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let f = setup().await;
                let repo = CardRepository::new(f.db.pool());
                let mut ids: Vec<i64> = fill(&repo, f.l1, &["a", "b", "c"])
                    .await
                    .iter()
                    .map(|c| c.id)
                    .collect();
                ids.extend(fill(&repo, f.l2, &["x", "y"]).await.iter().map(|c| c.id));

                for (pick, to_second, position) in moves {
                    let list = if to_second { f.l2 } else { f.l1 };
                    match repo.move_card(f.owner, ids[pick], list, position).await {
                        Ok(_) => assert_eq!(position.fract(), 0.0),
                        Err(e) => {
                            assert!(matches!(e, PinboardError::Validation(_)), "{e}");
                            assert_ne!(position.fract(), 0.0);
                        }
                    }
                    for list in [f.l1, f.l2] {
                        assert_unique(&repo.list_by_list(list).await.unwrap());
                    }
                }
            });
        }
    }
}
