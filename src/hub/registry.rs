//! Board subscription registry and the hub actor that owns it.
//!
//! One task owns the [`Registry`]; everything else talks to it through a
//! cloneable [`Hub`] handle. Commands are processed strictly one at a time in
//! the order they were sent, so a broadcast sent after `subscribe` returned
//! always sees that subscriber.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use super::event::BoardEvent;
use crate::config::HubConfig;

/// Sending half of a connection's outbound queue.
pub type OutboundSender = mpsc::Sender<Arc<str>>;

/// Receiving half of a connection's outbound queue.
pub type OutboundReceiver = mpsc::Receiver<Arc<str>>;

/// Identifies one connection in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a fresh random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of fanning one message out to a board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscribers whose queue accepted the message.
    pub delivered: usize,
    /// Subscribers removed because their queue was full or closed.
    pub dropped: usize,
}

/// Board ID to subscriber map.
///
/// The registry holds the only sender of each subscriber's outbound queue,
/// so removing a subscriber closes its queue.
#[derive(Debug, Default)]
pub struct Registry {
    boards: HashMap<i64, HashMap<ConnectionId, OutboundSender>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under a board.
    ///
    /// Returns false if it was already registered there; the existing queue
    /// is kept.
    pub fn subscribe(&mut self, board_id: i64, id: ConnectionId, outbound: OutboundSender) -> bool {
        let subscribers = self.boards.entry(board_id).or_default();
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, outbound);
        true
    }

    /// Remove a connection from a board.
    ///
    /// Removing the last subscriber removes the board entry. Returns false if
    /// the connection was not registered.
    pub fn unsubscribe(&mut self, board_id: i64, id: ConnectionId) -> bool {
        let Some(subscribers) = self.boards.get_mut(&board_id) else {
            return false;
        };
        let removed = subscribers.remove(&id).is_some();
        if subscribers.is_empty() {
            self.boards.remove(&board_id);
        }
        removed
    }

    /// Offer a message to every subscriber of a board without waiting.
    ///
    /// A subscriber whose queue is full or closed is removed on the spot and
    /// the rest still receive the message.
    pub fn broadcast(&mut self, board_id: i64, message: &Arc<str>) -> Delivery {
        let mut delivery = Delivery::default();
        let Some(subscribers) = self.boards.get_mut(&board_id) else {
            return delivery;
        };

        subscribers.retain(|id, outbound| match outbound.try_send(Arc::clone(message)) {
            Ok(()) => {
                delivery.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Dropping slow subscriber {} of board {}: outbound queue full",
                    id, board_id
                );
                delivery.dropped += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Dropping closed subscriber {} of board {}", id, board_id);
                delivery.dropped += 1;
                false
            }
        });

        if subscribers.is_empty() {
            self.boards.remove(&board_id);
        }
        delivery
    }

    /// Remove every subscriber of a board, closing their queues.
    ///
    /// Returns how many were removed.
    pub fn close_board(&mut self, board_id: i64) -> usize {
        self.boards
            .remove(&board_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// Number of subscribers of a board.
    pub fn subscriber_count(&self, board_id: i64) -> usize {
        self.boards.get(&board_id).map(HashMap::len).unwrap_or(0)
    }

    /// Number of boards with at least one subscriber.
    pub fn board_count(&self) -> usize {
        self.boards.len()
    }
}

enum Command {
    Subscribe {
        board_id: i64,
        id: ConnectionId,
        outbound: OutboundSender,
    },
    Unsubscribe {
        board_id: i64,
        id: ConnectionId,
    },
    Broadcast {
        board_id: i64,
        message: Arc<str>,
    },
    CloseBoard {
        board_id: i64,
    },
    Count {
        board_id: i64,
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the hub actor.
///
/// Cloning is cheap. The actor stops once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct Hub {
    commands: mpsc::Sender<Command>,
    outbound_capacity: usize,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Subscribe { board_id, id, .. } => write!(f, "Subscribe({board_id}, {id})"),
            Command::Unsubscribe { board_id, id } => write!(f, "Unsubscribe({board_id}, {id})"),
            Command::Broadcast { board_id, .. } => write!(f, "Broadcast({board_id})"),
            Command::CloseBoard { board_id } => write!(f, "CloseBoard({board_id})"),
            Command::Count { board_id, .. } => write!(f, "Count({board_id})"),
        }
    }
}

impl Hub {
    /// Spawn the actor on the current runtime.
    pub fn spawn(config: &HubConfig) -> Self {
        let (commands, intake) = mpsc::channel(config.intake_capacity.max(1));
        tokio::spawn(run(intake));
        debug!(
            "Hub started (intake {}, outbound {})",
            config.intake_capacity, config.outbound_queue_capacity
        );
        Self {
            commands,
            outbound_capacity: config.outbound_queue_capacity.max(1),
        }
    }

    /// Create an outbound queue sized for this hub.
    pub fn outbound_channel(&self) -> (OutboundSender, OutboundReceiver) {
        mpsc::channel(self.outbound_capacity)
    }

    async fn send(&self, command: Command) {
        if let Err(e) = self.commands.send(command).await {
            warn!("Hub is not running; dropped {:?}", e.0);
        }
    }

    /// Register a connection's outbound queue under a board.
    ///
    /// The hub takes ownership of `outbound`; it should be the queue's only
    /// sender so that unsubscribing closes the queue.
    pub async fn subscribe(&self, board_id: i64, id: ConnectionId, outbound: OutboundSender) {
        self.send(Command::Subscribe {
            board_id,
            id,
            outbound,
        })
        .await;
    }

    /// Remove a connection from a board. A no-op if it is not registered.
    pub async fn unsubscribe(&self, board_id: i64, id: ConnectionId) {
        self.send(Command::Unsubscribe { board_id, id }).await;
    }

    /// Publish an event to every subscriber of a board.
    ///
    /// Returns once the event is queued for the actor; delivery is not
    /// awaited.
    pub async fn broadcast(&self, board_id: i64, event: &BoardEvent) {
        match event.to_envelope() {
            Ok(message) => self.broadcast_envelope(board_id, message).await,
            Err(e) => warn!("Failed to serialize {} for board {}: {}", event.event, board_id, e),
        }
    }

    /// Publish an already serialized envelope to every subscriber of a board.
    pub async fn broadcast_envelope(&self, board_id: i64, message: Arc<str>) {
        self.send(Command::Broadcast { board_id, message }).await;
    }

    /// Drop every subscriber of a board.
    pub async fn close_board(&self, board_id: i64) {
        self.send(Command::CloseBoard { board_id }).await;
    }

    /// Number of connections currently subscribed to a board.
    pub async fn subscriber_count(&self, board_id: i64) -> usize {
        let (reply, response) = oneshot::channel();
        self.send(Command::Count { board_id, reply }).await;
        response.await.unwrap_or(0)
    }
}

async fn run(mut intake: mpsc::Receiver<Command>) {
    let mut registry = Registry::new();

    while let Some(command) = intake.recv().await {
        match command {
            Command::Subscribe {
                board_id,
                id,
                outbound,
            } => {
                if registry.subscribe(board_id, id, outbound) {
                    debug!(
                        "Subscribed {} to board {} ({} subscribers)",
                        id,
                        board_id,
                        registry.subscriber_count(board_id)
                    );
                }
            }
            Command::Unsubscribe { board_id, id } => {
                if registry.unsubscribe(board_id, id) {
                    debug!(
                        "Unsubscribed {} from board {} ({} subscribers)",
                        id,
                        board_id,
                        registry.subscriber_count(board_id)
                    );
                }
            }
            Command::Broadcast { board_id, message } => {
                let delivery = registry.broadcast(board_id, &message);
                if delivery.dropped > 0 {
                    debug!(
                        "Broadcast to board {}: {} delivered, {} dropped",
                        board_id, delivery.delivered, delivery.dropped
                    );
                }
            }
            Command::CloseBoard { board_id } => {
                let closed = registry.close_board(board_id);
                debug!("Closed board {} ({} subscribers dropped)", board_id, closed);
            }
            Command::Count { board_id, reply } => {
                let _ = reply.send(registry.subscriber_count(board_id));
            }
        }
    }

    debug!(
        "Hub stopped ({} boards still subscribed)",
        registry.board_count()
    );
}
