//! Real-time event envelope.
//!
//! Every message a subscriber receives has the shape
//! `{"event": "<TAG>", "payload": <value>}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Full board state sent to a connection on admission.
    BoardSnapshot,
    /// Board renamed.
    BoardUpdated,
    /// Board deleted; subscribers are dropped after this event.
    BoardDeleted,
    /// Member added to the board.
    MemberAdded,
    /// Member removed from the board.
    MemberRemoved,
    /// List created.
    ListCreated,
    /// List renamed.
    ListUpdated,
    /// List moved.
    ListMoved,
    /// List deleted.
    ListDeleted,
    /// Card created.
    CardCreated,
    /// Card title or description changed.
    CardUpdated,
    /// Card moved.
    CardMoved,
    /// Card deleted.
    CardDeleted,
}

impl EventKind {
    /// Get the wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BoardSnapshot => "BOARD_SNAPSHOT",
            EventKind::BoardUpdated => "BOARD_UPDATED",
            EventKind::BoardDeleted => "BOARD_DELETED",
            EventKind::MemberAdded => "MEMBER_ADDED",
            EventKind::MemberRemoved => "MEMBER_REMOVED",
            EventKind::ListCreated => "LIST_CREATED",
            EventKind::ListUpdated => "LIST_UPDATED",
            EventKind::ListMoved => "LIST_MOVED",
            EventKind::ListDeleted => "LIST_DELETED",
            EventKind::CardCreated => "CARD_CREATED",
            EventKind::CardUpdated => "CARD_UPDATED",
            EventKind::CardMoved => "CARD_MOVED",
            EventKind::CardDeleted => "CARD_DELETED",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An event published to the subscribers of one board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardEvent {
    /// Event tag.
    pub event: EventKind,
    /// Event-specific payload.
    pub payload: Value,
}

impl BoardEvent {
    /// Create an event from any serializable payload.
    pub fn new<T: Serialize>(event: EventKind, payload: &T) -> Result<Self> {
        Ok(Self {
            event,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Serialize into the wire envelope.
    ///
    /// The result is shared by every subscriber queue it is sent to.
    pub fn to_envelope(&self) -> Result<Arc<str>> {
        Ok(Arc::from(serde_json::to_string(self)?))
    }
}
