//! List repository for pinboard.

use super::ordering::LISTS;
use super::position::{MoveOutcome, Placement};
use super::types::{List, NewList};
use crate::db::{Db, DbPool, SQL_NOW};
use crate::{PinboardError, Result};

const LIST_COLUMNS: &str = "id, title, position, board_id, created_at, updated_at";

/// Lists of a board in ascending position order, on any executor.
pub(crate) async fn fetch_board_lists<'e, E>(executor: E, board_id: i64) -> Result<Vec<List>>
where
    E: sqlx::Executor<'e, Database = Db>,
{
    let sql =
        format!("SELECT {LIST_COLUMNS} FROM lists WHERE board_id = $1 ORDER BY position, id");
    let lists = sqlx::query_as::<_, List>(&sql)
        .bind(board_id)
        .fetch_all(executor)
        .await?;
    Ok(lists)
}

/// Repository for lists ordered within a board.
pub struct ListRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ListRepository<'a> {
    /// Create a new ListRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Append a new list to the end of a board.
    pub async fn create(&self, board_id: i64, new_list: &NewList) -> Result<List> {
        let mut tx = self.pool.begin().await?;

        LISTS.lock_container(&mut tx, board_id).await?;
        let position = LISTS.next_position(&mut tx, board_id).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO lists (title, position, board_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&new_list.title)
        .bind(position)
        .bind(board_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| PinboardError::NotFound("list".to_string()))
    }

    /// Get a list by ID (without its cards).
    pub async fn get_by_id(&self, id: i64) -> Result<Option<List>> {
        let sql = format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = $1");
        let list = sqlx::query_as::<_, List>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(list)
    }

    /// Lists of a board in ascending position order.
    pub async fn list_by_board(&self, board_id: i64) -> Result<Vec<List>> {
        fetch_board_lists(self.pool, board_id).await
    }

    /// Highest list position on a board, or None if the board has no lists.
    pub async fn max_position(&self, board_id: i64) -> Result<Option<f64>> {
        let mut conn = self.pool.acquire().await?;
        LISTS.max_position(&mut conn, board_id).await
    }

    /// Change a list's title.
    ///
    /// Returns the updated list, or None if not found.
    pub async fn update_title(&self, id: i64, title: &str) -> Result<Option<List>> {
        let sql = format!("UPDATE lists SET title = $1, updated_at = {SQL_NOW} WHERE id = $2");
        let result = sqlx::query(&sql)
            .bind(title)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Delete a list and its cards, closing the gap on the board.
    pub async fn delete(&self, id: i64) -> Result<Placement> {
        LISTS.remove_item(self.pool, id).await
    }

    /// Move a list to `new_position` on `new_board_id` for `actor_id`.
    pub async fn move_list(
        &self,
        actor_id: i64,
        id: i64,
        new_board_id: i64,
        new_position: f64,
    ) -> Result<MoveOutcome> {
        LISTS
            .move_item(self.pool, actor_id, id, new_board_id, new_position)
            .await
    }
}
