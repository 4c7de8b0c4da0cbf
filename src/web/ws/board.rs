//! Board WebSocket handler.
//!
//! A client connects to a single board's live feed. The first frame it
//! receives is the `BOARD_SNAPSHOT` envelope; every later frame is a board
//! event. Frames from the client are ignored apart from close.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
    Extension,
};
use futures::{future, SinkExt, StreamExt};

use crate::board::BoardContext;
use crate::hub::{admit, AdmittedConnection, Principal};
use crate::web::error::ApiError;

/// Board WebSocket handler.
///
/// GET /api/boards/{board_id}/ws
///
/// The caller must carry a principal with access to the board. Admission
/// runs before the upgrade, so a rejected caller gets a plain HTTP error.
pub async fn board_ws_handler(
    State(ctx): State<BoardContext>,
    Path(board_id): Path<i64>,
    principal: Option<Extension<Principal>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let Some(Extension(principal)) = principal else {
        return Err(ApiError::unauthorized("Missing authorization"));
    };

    let admitted = admit(&ctx.boards(), ctx.hub(), principal, board_id)
        .await
        .map_err(|e| {
            tracing::debug!(
                "WebSocket connection to board {} rejected for user {}: {}",
                board_id,
                principal.user_id,
                e
            );
            ApiError::from(e)
        })?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            admitted.abandon().await;
            return Ok(rejection.into_response());
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, admitted)))
}

/// Serve an admitted connection over an upgraded socket.
async fn handle_socket(socket: WebSocket, admitted: AdmittedConnection) {
    let id = admitted.id();
    tracing::debug!("WebSocket session {} started", id);

    let (sender, receiver) = socket.split();
    let sender = sender
        .with(|text: Arc<str>| future::ready(Ok::<_, axum::Error>(Message::Text(text.to_string()))));
    let receiver =
        receiver.take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))));

    let reason = admitted.serve(sender, receiver).await;
    tracing::debug!("WebSocket session {} ended: {:?}", id, reason);
}
