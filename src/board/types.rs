//! Board, list and card models.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Maximum length for board names and list/card titles (in characters).
pub const MAX_TITLE_LENGTH: u64 = 200;

/// Maximum length for card descriptions (in characters).
pub const MAX_DESCRIPTION_LENGTH: u64 = 10_000;

/// Board entity.
///
/// `lists` is only populated when the board is read as a full snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Board {
    /// Unique board ID.
    pub id: i64,
    /// Board name.
    pub name: String,
    /// Owning user.
    pub owner_id: i64,
    /// Creation timestamp.
    pub created_at: String,
    /// Last modification timestamp.
    pub updated_at: String,
    /// Lists in ascending position order.
    #[sqlx(skip)]
    #[serde(default)]
    pub lists: Vec<List>,
}

/// List entity.
///
/// `cards` is only populated when the list is part of a board snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct List {
    /// Unique list ID.
    pub id: i64,
    /// List title.
    pub title: String,
    /// Ordering key within the board.
    pub position: f64,
    /// Owning board.
    pub board_id: i64,
    /// Creation timestamp.
    pub created_at: String,
    /// Last modification timestamp.
    pub updated_at: String,
    /// Cards in ascending position order.
    #[sqlx(skip)]
    #[serde(default)]
    pub cards: Vec<Card>,
}

/// Card entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Card {
    /// Unique card ID.
    pub id: i64,
    /// Card title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Ordering key within the list.
    pub position: f64,
    /// Owning list.
    pub list_id: i64,
    /// Creation timestamp.
    pub created_at: String,
    /// Last modification timestamp.
    pub updated_at: String,
}

/// Reject strings that are empty after trimming.
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank").with_message("Must not be empty".into()));
    }
    Ok(())
}

/// Data for creating a new board.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBoard {
    /// Board name.
    #[validate(length(max = MAX_TITLE_LENGTH), custom(function = "not_blank"))]
    pub name: String,
}

impl NewBoard {
    /// Create a new board request.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Data for creating a new list.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewList {
    /// List title.
    #[validate(length(max = MAX_TITLE_LENGTH), custom(function = "not_blank"))]
    pub title: String,
}

impl NewList {
    /// Create a new list request.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Data for creating a new card.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCard {
    /// Card title.
    #[validate(length(max = MAX_TITLE_LENGTH), custom(function = "not_blank"))]
    pub title: String,
    /// Card description.
    #[serde(default)]
    #[validate(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: String,
}

impl NewCard {
    /// Create a new card request with an empty description.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial update of a card's text.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CardUpdate {
    /// New title.
    #[validate(length(max = MAX_TITLE_LENGTH), custom(function = "not_blank"))]
    pub title: Option<String>,
    /// New description.
    #[validate(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: Option<String>,
}

impl CardUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check if the update carries no changes.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

/// Request to move a list or card.
///
/// For cards the container is a list; for lists it is a board. The position
/// is taken as given and not checked against the positions of siblings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MoveRequest {
    /// ID of the card or list being moved.
    pub item_id: i64,
    /// Destination list (for cards) or board (for lists).
    pub new_container_id: i64,
    /// Requested position in the destination.
    pub new_position: f64,
}

impl MoveRequest {
    /// Create a move request.
    pub fn new(item_id: i64, new_container_id: i64, new_position: f64) -> Self {
        Self {
            item_id,
            new_container_id,
            new_position,
        }
    }
}

/// An item after a move, with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovedItem<T> {
    /// The item in its new place.
    pub item: T,
    /// Container the item left.
    pub from_container_id: i64,
    /// Position the item left.
    pub from_position: f64,
}
