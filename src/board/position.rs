//! Position allocation for ordered siblings.
//!
//! Lists are ordered within a board and cards within a list by a real-valued
//! `position`; ascending position is display order. Appends take the next
//! whole number after the current maximum. A move closes the gap it leaves in
//! the source container and opens a slot at the target, shifting displaced
//! siblings by one. Unit shifts only keep siblings distinct while every
//! position is a whole number, so move targets must be whole numbers too. Nothing here touches the store: the SQL move in
//! [`super::ordering`] runs the set-based form of the same [`MovePlan`] inside
//! one transaction.

use crate::{PinboardError, Result};

/// Position given to the first item of an empty container.
pub const START_POSITION: f64 = 1.0;

/// Largest magnitude a move target may have.
///
/// Every whole number up to here, plus one, is exact in an `f64`.
pub const MAX_POSITION: f64 = 4_503_599_627_370_496.0;

/// Check a requested move target.
///
/// Only the value itself is checked, never the siblings it may land on.
pub fn check_target(position: f64) -> Result<f64> {
    if !position.is_finite() {
        return Err(PinboardError::Validation(
            "position must be a finite number".to_string(),
        ));
    }
    if position.fract() != 0.0 || position.abs() > MAX_POSITION {
        return Err(PinboardError::Validation(format!(
            "position must be a whole number, got {position}"
        )));
    }
    Ok(position)
}

/// Position for an item appended to a container whose current maximum is `max`.
pub fn append_position(max: Option<f64>) -> f64 {
    match max {
        Some(max) => max + 1.0,
        None => START_POSITION,
    }
}

/// Where an ordered item currently sits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Item ID.
    pub id: i64,
    /// Owning container (board for lists, list for cards).
    pub container_id: i64,
    /// Ordering key within the container.
    pub position: f64,
}

impl Placement {
    /// Create a placement.
    pub fn new(id: i64, container_id: i64, position: f64) -> Self {
        Self {
            id,
            container_id,
            position,
        }
    }
}

/// A single move of one item, from its current slot to a requested one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePlan {
    /// Item being moved.
    pub item_id: i64,
    /// Container the item leaves.
    pub from_container: i64,
    /// Position the item leaves.
    pub from_position: f64,
    /// Container the item enters.
    pub to_container: i64,
    /// Position the item takes.
    pub to_position: f64,
}

impl MovePlan {
    /// Plan moving the item at `from` to `to_position` in `to_container`.
    pub fn new(from: Placement, to_container: i64, to_position: f64) -> Self {
        Self {
            item_id: from.id,
            from_container: from.container_id,
            from_position: from.position,
            to_container,
            to_position,
        }
    }

    /// Whether the item stays in the same container.
    pub fn is_same_container(&self) -> bool {
        self.from_container == self.to_container
    }

    /// Whether the move leaves every position unchanged.
    pub fn is_noop(&self) -> bool {
        self.is_same_container() && self.from_position == self.to_position
    }

    /// Position of a source-container sibling after the gap is closed.
    pub fn shift_in_source(&self, position: f64) -> f64 {
        if position > self.from_position {
            position - 1.0
        } else {
            position
        }
    }

    /// Position of a target-container sibling after the slot is opened.
    pub fn shift_in_target(&self, position: f64) -> f64 {
        if position >= self.to_position {
            position + 1.0
        } else {
            position
        }
    }

    /// Apply the move to an in-memory set of placements.
    ///
    /// Steps run in the same order as the store transaction: close the gap in
    /// the source, open the slot in the target, then place the item. Both
    /// shifts apply even when source and target are the same container.
    pub fn apply(&self, placements: &mut [Placement]) {
        for p in placements.iter_mut() {
            if p.container_id == self.from_container {
                p.position = self.shift_in_source(p.position);
            }
        }
        for p in placements.iter_mut() {
            if p.container_id == self.to_container {
                p.position = self.shift_in_target(p.position);
            }
        }
        for p in placements.iter_mut() {
            if p.id == self.item_id {
                p.container_id = self.to_container;
                p.position = self.to_position;
            }
        }
    }
}

/// A committed move and the boards on either side of it.
///
/// Both boards are resolved from the locked rows inside the move's
/// transaction, not from an earlier read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    /// What moved, from where, to where.
    pub plan: MovePlan,
    /// Board owning the source container.
    pub from_board: i64,
    /// Board owning the target container.
    pub to_board: i64,
}

impl MoveOutcome {
    /// Boards touched by the move: the source, then the target if different.
    pub fn boards(&self) -> Vec<i64> {
        if self.from_board == self.to_board {
            vec![self.from_board]
        } else {
            vec![self.from_board, self.to_board]
        }
    }
}
