//! Per-client connection tasks.
//!
//! A connection pairs a writer, which drains the outbound queue the hub
//! feeds, with a reader that only watches the inbound side for closure.
//! Either side noticing the end tears the connection down: the reader
//! unsubscribes, which closes the queue and stops the writer; the writer
//! unsubscribes on a failed write and stops the reader.

use std::fmt::Display;
use std::sync::Arc;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, info};

use super::registry::{ConnectionId, Hub, OutboundReceiver};

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The outbound queue was closed by the hub: the client went away, was
    /// too slow, or the board was deleted.
    QueueClosed,
    /// Writing to the transport failed.
    WriteFailed,
}

/// An admitted client bound to a transport.
///
/// `W` is the outbound half of the transport and `R` the inbound half. The
/// connection does not interpret inbound messages.
pub struct Connection<W, R> {
    id: ConnectionId,
    board_id: i64,
    hub: Hub,
    outbound: OutboundReceiver,
    sink: W,
    stream: R,
}

impl<W, R> Connection<W, R> {
    /// Bind an outbound queue already registered with the hub to a transport.
    pub fn new(
        id: ConnectionId,
        board_id: i64,
        hub: Hub,
        outbound: OutboundReceiver,
        sink: W,
        stream: R,
    ) -> Self {
        Self {
            id,
            board_id,
            hub,
            outbound,
            sink,
            stream,
        }
    }

    /// Get the connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Run until either side closes.
    ///
    /// The reader runs as its own task; the writer runs on the caller's.
    /// On return the connection is unsubscribed and the sink closed.
    pub async fn run<M, E>(self) -> CloseReason
    where
        W: Sink<Arc<str>> + Unpin,
        W::Error: Display,
        R: Stream<Item = Result<M, E>> + Unpin + Send + 'static,
        M: Send + 'static,
        E: Display + Send + 'static,
    {
        let Connection {
            id,
            board_id,
            hub,
            mut outbound,
            mut sink,
            stream,
        } = self;

        let reader = tokio::spawn(read_loop(stream, hub.clone(), board_id, id));

        let mut reason = CloseReason::QueueClosed;
        while let Some(message) = outbound.recv().await {
            if let Err(e) = sink.send(message).await {
                debug!("Write to connection {} failed: {}", id, e);
                hub.unsubscribe(board_id, id).await;
                reason = CloseReason::WriteFailed;
                break;
            }
        }

        if let Err(e) = sink.close().await {
            debug!("Closing connection {} failed: {}", id, e);
        }
        reader.abort();
        let _ = reader.await;

        info!(
            "Connection {} to board {} closed ({:?})",
            id, board_id, reason
        );
        reason
    }
}

/// Drain the inbound side until it ends or fails, then unsubscribe.
async fn read_loop<R, M, E>(mut stream: R, hub: Hub, board_id: i64, id: ConnectionId)
where
    R: Stream<Item = Result<M, E>> + Unpin,
    E: Display,
{
    while let Some(item) = stream.next().await {
        if let Err(e) = item {
            debug!("Read from connection {} failed: {}", id, e);
            break;
        }
    }
    debug!("Connection {} inbound side closed", id);
    hub.unsubscribe(board_id, id).await;
}
