//! Transactional ordering primitives shared by lists and cards.
//!
//! Lists live in boards and cards live in lists; both tables carry a
//! `position` column scoped by a container column. Appends, moves and
//! removals are expressed once here against an [`OrderedTable`].
//!
//! On PostgreSQL the item row and the containers it moves between are locked
//! with `SELECT ... FOR UPDATE`, so moves in disjoint containers never wait
//! on each other. SQLite has no row locks: the lock step is a no-op `UPDATE`
//! that takes the database write lock before anything is read, and moves
//! serialise database-wide.

use tracing::debug;

use super::position::{append_position, check_target, MoveOutcome, MovePlan, Placement};
use super::repository::has_access;
use crate::db::{DbConnection, DbPool, SQL_NOW};
use crate::{PinboardError, Result};

/// Suffix that row-locks the rows a `SELECT` returns.
#[cfg(feature = "sqlite")]
const ROW_LOCK: &str = "";

/// Suffix that row-locks the rows a `SELECT` returns.
#[cfg(feature = "postgres")]
const ROW_LOCK: &str = " FOR UPDATE";

/// An ordered child table and the table that contains its rows.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OrderedTable {
    /// Child table name.
    table: &'static str,
    /// Child entity name used in errors.
    entity: &'static str,
    /// Column referencing the container.
    container_column: &'static str,
    /// Container table name.
    container_table: &'static str,
    /// Container entity name used in errors.
    container_entity: &'static str,
    /// Column of the container table holding its board ID.
    board_column: &'static str,
}

/// Lists ordered within a board.
pub(crate) const LISTS: OrderedTable = OrderedTable {
    table: "lists",
    entity: "list",
    container_column: "board_id",
    container_table: "boards",
    container_entity: "board",
    board_column: "id",
};

/// Cards ordered within a list.
pub(crate) const CARDS: OrderedTable = OrderedTable {
    table: "cards",
    entity: "card",
    container_column: "list_id",
    container_table: "lists",
    container_entity: "list",
    board_column: "board_id",
};

fn tx_error(e: sqlx::Error) -> PinboardError {
    PinboardError::Transaction(e.to_string())
}

impl OrderedTable {
    /// Lock a container row ahead of an append.
    ///
    /// Fails with `NotFound` if the container does not exist.
    pub(crate) async fn lock_container(
        &self,
        conn: &mut DbConnection,
        container_id: i64,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET updated_at = {SQL_NOW} WHERE id = $1",
            self.container_table
        );
        let result = sqlx::query(&sql)
            .bind(container_id)
            .execute(&mut *conn)
            .await
            .map_err(tx_error)?;
        if result.rows_affected() == 0 {
            return Err(PinboardError::NotFound(self.container_entity.to_string()));
        }
        Ok(())
    }

    /// Take the SQLite write lock through the item row before any read.
    #[cfg(feature = "sqlite")]
    async fn take_write_lock(&self, conn: &mut DbConnection, item_id: i64) -> Result<()> {
        let sql = format!("UPDATE {} SET position = position WHERE id = $1", self.table);
        sqlx::query(&sql)
            .bind(item_id)
            .execute(&mut *conn)
            .await
            .map_err(tx_error)?;
        Ok(())
    }

    /// Read where an item sits, locking its row.
    async fn read_item(&self, conn: &mut DbConnection, item_id: i64) -> Result<Placement> {
        let sql = format!(
            "SELECT {}, position FROM {} WHERE id = $1{ROW_LOCK}",
            self.container_column, self.table
        );
        let row: Option<(i64, f64)> = sqlx::query_as(&sql)
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(tx_error)?;
        let (container_id, position) =
            row.ok_or_else(|| PinboardError::NotFound(self.entity.to_string()))?;

        Ok(Placement::new(item_id, container_id, position))
    }

    /// Container an item sits in, without locking anything.
    async fn container_of(&self, conn: &mut DbConnection, item_id: i64) -> Result<i64> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            self.container_column, self.table
        );
        let container: Option<i64> = sqlx::query_scalar(&sql)
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(tx_error)?;
        container.ok_or_else(|| PinboardError::NotFound(self.entity.to_string()))
    }

    /// Lock the source and target containers and resolve their boards.
    ///
    /// Rows are locked in ID order. Fails with `NotFound` if either
    /// container does not exist.
    async fn lock_containers(
        &self,
        conn: &mut DbConnection,
        from_container: i64,
        to_container: i64,
    ) -> Result<(i64, i64)> {
        let sql = format!(
            "SELECT id, {} FROM {} WHERE id IN ($1, $2) ORDER BY id{ROW_LOCK}",
            self.board_column, self.container_table
        );
        let rows: Vec<(i64, i64)> = sqlx::query_as(&sql)
            .bind(from_container)
            .bind(to_container)
            .fetch_all(&mut *conn)
            .await
            .map_err(tx_error)?;

        let board_of = |container: i64| {
            rows.iter()
                .find(|(id, _)| *id == container)
                .map(|(_, board)| *board)
                .ok_or_else(|| PinboardError::NotFound(self.container_entity.to_string()))
        };
        Ok((board_of(from_container)?, board_of(to_container)?))
    }

    /// Lock an item together with the container it leaves and the one it
    /// enters (its own container when `to_container` is None).
    ///
    /// Containers are locked before the item so every writer of a
    /// container's positions takes locks in the same order. An item that
    /// changed container between the first read and its lock fails the
    /// transaction. Returns the locked placement and both boards.
    async fn lock_item(
        &self,
        conn: &mut DbConnection,
        item_id: i64,
        to_container: Option<i64>,
    ) -> Result<(Placement, i64, i64)> {
        #[cfg(feature = "sqlite")]
        self.take_write_lock(conn, item_id).await?;

        let seen = self.container_of(conn, item_id).await?;
        let (from_board, to_board) = self
            .lock_containers(conn, seen, to_container.unwrap_or(seen))
            .await?;

        let placement = self.read_item(conn, item_id).await?;
        if placement.container_id != seen {
            return Err(PinboardError::Transaction(format!(
                "{} {} changed {} while being locked",
                self.entity, item_id, self.container_entity
            )));
        }
        Ok((placement, from_board, to_board))
    }

    /// Highest position currently used in a container.
    pub(crate) async fn max_position(
        &self,
        conn: &mut DbConnection,
        container_id: i64,
    ) -> Result<Option<f64>> {
        let sql = format!(
            "SELECT MAX(position) FROM {} WHERE {} = $1",
            self.table, self.container_column
        );
        let max: Option<f64> = sqlx::query_scalar(&sql)
            .bind(container_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(max)
    }

    /// Position for a new item appended to a locked container.
    pub(crate) async fn next_position(
        &self,
        conn: &mut DbConnection,
        container_id: i64,
    ) -> Result<f64> {
        Ok(append_position(self.max_position(conn, container_id).await?))
    }

    /// Decrement every sibling above `removed_at`.
    async fn close_gap(
        &self,
        conn: &mut DbConnection,
        container_id: i64,
        removed_at: f64,
    ) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET position = position - 1 WHERE {} = $1 AND position > $2",
            self.table, self.container_column
        );
        let result = sqlx::query(&sql)
            .bind(container_id)
            .bind(removed_at)
            .execute(&mut *conn)
            .await
            .map_err(tx_error)?;
        Ok(result.rows_affected())
    }

    /// Increment every sibling at or above `insert_at`.
    async fn open_slot(
        &self,
        conn: &mut DbConnection,
        container_id: i64,
        insert_at: f64,
    ) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET position = position + 1 WHERE {} = $1 AND position >= $2",
            self.table, self.container_column
        );
        let result = sqlx::query(&sql)
            .bind(container_id)
            .bind(insert_at)
            .execute(&mut *conn)
            .await
            .map_err(tx_error)?;
        Ok(result.rows_affected())
    }

    /// Move an item to `to_position` within `to_container` on behalf of
    /// `actor_id`, in one transaction.
    ///
    /// Lock both containers and the item, resolve the boards, check the
    /// actor may edit both boards, close the gap in the old container,
    /// open a slot in the new one, write the item, commit. Any failure rolls
    /// back every step. The target must be a whole number; it is not
    /// compared against sibling positions, collisions are resolved by the
    /// shifts.
    pub(crate) async fn move_item(
        &self,
        pool: &DbPool,
        actor_id: i64,
        item_id: i64,
        to_container: i64,
        to_position: f64,
    ) -> Result<MoveOutcome> {
        let to_position = check_target(to_position)?;

        let mut tx = pool.begin().await.map_err(tx_error)?;

        let (from, from_board, to_board) =
            self.lock_item(&mut tx, item_id, Some(to_container)).await?;
        let plan = MovePlan::new(from, to_container, to_position);
        let outcome = MoveOutcome {
            plan,
            from_board,
            to_board,
        };

        for board_id in outcome.boards() {
            if !has_access(&mut *tx, board_id, actor_id).await? {
                return Err(PinboardError::AccessDenied(format!("board {board_id}")));
            }
        }

        let closed = self
            .close_gap(&mut tx, plan.from_container, plan.from_position)
            .await?;
        let opened = self
            .open_slot(&mut tx, plan.to_container, plan.to_position)
            .await?;

        let sql = format!(
            "UPDATE {} SET {} = $1, position = $2, updated_at = {SQL_NOW} WHERE id = $3",
            self.table, self.container_column
        );
        sqlx::query(&sql)
            .bind(plan.to_container)
            .bind(plan.to_position)
            .bind(item_id)
            .execute(&mut *tx)
            .await
            .map_err(tx_error)?;

        tx.commit().await.map_err(tx_error)?;

        debug!(
            "Moved {} {} from {} {}@{} to {} {}@{} ({} closed, {} opened)",
            self.entity,
            item_id,
            self.container_entity,
            plan.from_container,
            plan.from_position,
            self.container_entity,
            plan.to_container,
            plan.to_position,
            closed,
            opened
        );
        Ok(outcome)
    }

    /// Delete an item and close the gap it leaves, in one transaction.
    pub(crate) async fn remove_item(&self, pool: &DbPool, item_id: i64) -> Result<Placement> {
        let mut tx = pool.begin().await.map_err(tx_error)?;

        let (placement, _, _) = self.lock_item(&mut tx, item_id, None).await?;

        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
        sqlx::query(&sql)
            .bind(item_id)
            .execute(&mut *tx)
            .await
            .map_err(tx_error)?;

        self.close_gap(&mut tx, placement.container_id, placement.position)
            .await?;

        tx.commit().await.map_err(tx_error)?;
        Ok(placement)
    }
}
