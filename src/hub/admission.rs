//! Admitting a client to a board's live feed.

use std::fmt::Display;
use std::sync::Arc;

use futures::{Sink, Stream};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::connection::{CloseReason, Connection};
use super::event::{BoardEvent, EventKind};
use super::registry::{ConnectionId, Hub, OutboundReceiver};
use crate::board::{Board, BoardService};
use crate::{PinboardError, Result};

/// An authenticated caller, as established by the surrounding auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Authenticated user ID.
    pub user_id: i64,
}

impl Principal {
    /// Create a principal for a user.
    pub fn new(user_id: i64) -> Self {
        Self { user_id }
    }
}

/// A client that passed admission and is subscribed to its board.
///
/// Its outbound queue already holds the `BOARD_SNAPSHOT` envelope, ahead of
/// any event broadcast after the subscription.
pub struct AdmittedConnection {
    id: ConnectionId,
    board_id: i64,
    principal: Principal,
    snapshot: Board,
    hub: Hub,
    outbound: OutboundReceiver,
}

impl AdmittedConnection {
    /// Get the connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the board this connection follows.
    pub fn board_id(&self) -> i64 {
        self.board_id
    }

    /// Get the admitted principal.
    pub fn principal(&self) -> Principal {
        self.principal
    }

    /// The snapshot the client starts from.
    pub fn snapshot(&self) -> &Board {
        &self.snapshot
    }

    /// Bind the connection to a transport.
    pub fn attach<W, R>(self, sink: W, stream: R) -> Connection<W, R> {
        Connection::new(self.id, self.board_id, self.hub, self.outbound, sink, stream)
    }

    /// Bind the connection to a transport and run it to completion.
    pub async fn serve<W, R, M, E>(self, sink: W, stream: R) -> CloseReason
    where
        W: Sink<Arc<str>> + Unpin,
        W::Error: Display,
        R: Stream<Item = std::result::Result<M, E>> + Unpin + Send + 'static,
        M: Send + 'static,
        E: Display + Send + 'static,
    {
        self.attach(sink, stream).run().await
    }

    /// Give up on a connection that never got a transport.
    pub async fn abandon(self) {
        self.hub.unsubscribe(self.board_id, self.id).await;
    }
}

impl std::fmt::Debug for AdmittedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmittedConnection")
            .field("id", &self.id)
            .field("board_id", &self.board_id)
            .field("principal", &self.principal)
            .finish()
    }
}

/// Admit a principal to a board's live feed.
///
/// Access is checked and the snapshot read through
/// [`BoardService::get_board`]; a rejected caller gets the error and nothing
/// is allocated. On success the snapshot is queued first and the connection
/// is subscribed after it, so the client sees the snapshot before any event.
pub async fn admit(
    boards: &BoardService<'_>,
    hub: &Hub,
    principal: Principal,
    board_id: i64,
) -> Result<AdmittedConnection> {
    let snapshot = boards.get_board(board_id, principal.user_id).await?;
    let envelope = BoardEvent::new(EventKind::BoardSnapshot, &snapshot)?.to_envelope()?;

    let (outbound_tx, outbound) = hub.outbound_channel();
    outbound_tx.try_send(envelope).map_err(|_| {
        PinboardError::Io(std::io::Error::other("outbound queue rejected the snapshot"))
    })?;

    let id = ConnectionId::new();
    hub.subscribe(board_id, id, outbound_tx).await;

    info!(
        "Admitted user {} to board {} as connection {}",
        principal.user_id, board_id, id
    );

    Ok(AdmittedConnection {
        id,
        board_id,
        principal,
        snapshot,
        hub: hub.clone(),
        outbound,
    })
}
