//! Board repository for pinboard.
//!
//! This module provides CRUD operations for boards and their membership.

use super::types::{Board, NewBoard};
use crate::db::{Db, DbPool, User, SQL_NOW};
use crate::{PinboardError, Result};

const BOARD_COLUMNS: &str = "id, name, owner_id, created_at, updated_at";

/// Board row by ID on any executor.
pub(crate) async fn fetch_board<'e, E>(executor: E, id: i64) -> Result<Option<Board>>
where
    E: sqlx::Executor<'e, Database = Db>,
{
    let sql = format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1");
    let board = sqlx::query_as::<_, Board>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(board)
}

/// Owner-or-member check on any executor, so moves can repeat it inside
/// their own transaction.
pub(crate) async fn has_access<'e, E>(executor: E, board_id: i64, user_id: i64) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Db>,
{
    let allowed: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM boards WHERE id = $1 AND owner_id = $2)
             OR EXISTS(SELECT 1 FROM board_members WHERE board_id = $1 AND user_id = $2)",
    )
    .bind(board_id)
    .bind(user_id)
    .fetch_one(executor)
    .await?;
    Ok(allowed)
}

/// Repository for board CRUD operations.
pub struct BoardRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> BoardRepository<'a> {
    /// Create a new BoardRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new board owned by `owner_id`.
    ///
    /// The owner is enrolled as a member in the same transaction.
    pub async fn create(&self, owner_id: i64, new_board: &NewBoard) -> Result<Board> {
        let mut tx = self.pool.begin().await?;

        let id: i64 =
            sqlx::query_scalar("INSERT INTO boards (name, owner_id) VALUES ($1, $2) RETURNING id")
                .bind(&new_board.name)
                .bind(owner_id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query("INSERT INTO board_members (board_id, user_id) VALUES ($1, $2)")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| PinboardError::NotFound("board".to_string()))
    }

    /// Get a board by ID (without its lists).
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Board>> {
        fetch_board(self.pool, id).await
    }

    /// List boards a user owns or is a member of, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Board>> {
        let boards = sqlx::query_as::<_, Board>(
            "SELECT DISTINCT b.id, b.name, b.owner_id, b.created_at, b.updated_at
             FROM boards b
             LEFT JOIN board_members m ON m.board_id = b.id
             WHERE b.owner_id = $1 OR m.user_id = $1
             ORDER BY b.created_at DESC, b.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(boards)
    }

    /// Rename a board.
    ///
    /// Returns the updated board, or None if not found.
    pub async fn rename(&self, id: i64, name: &str) -> Result<Option<Board>> {
        let sql = format!("UPDATE boards SET name = $1, updated_at = {SQL_NOW} WHERE id = $2");
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Delete a board by ID.
    ///
    /// Lists, cards and memberships go with it. Returns true if a board was
    /// deleted.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add a member to a board.
    ///
    /// Returns false if the user was already a member.
    pub async fn add_member(&self, board_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO board_members (board_id, user_id) VALUES ($1, $2)
             ON CONFLICT (user_id, board_id) DO NOTHING",
        )
        .bind(board_id)
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a member from a board.
    ///
    /// Returns false if the user was not a member.
    pub async fn remove_member(&self, board_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM board_members WHERE board_id = $1 AND user_id = $2")
            .bind(board_id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check whether a user owns or is a member of a board.
    ///
    /// A missing board yields false.
    pub async fn is_member_or_owner(&self, board_id: i64, user_id: i64) -> Result<bool> {
        has_access(self.pool, board_id, user_id).await
    }

    /// List the members of a board, in the order they were added.
    pub async fn list_members(&self, board_id: i64) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT u.id, u.name, u.email, u.created_at
             FROM board_members m
             JOIN users u ON u.id = m.user_id
             WHERE m.board_id = $1
             ORDER BY m.added_at, u.id",
        )
        .bind(board_id)
        .fetch_all(self.pool)
        .await?;
        Ok(users)
    }
}
