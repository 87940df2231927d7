use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use super::rooms::validate_room_name;
use crate::infra::{app_state::AppState, errors::AppError};

#[derive(Debug, Deserialize)]
pub struct WatchPartyQuery {
    pub room: String,
}

/// Upgrade to a watch-party relay connection.
///
/// Text frames are re-broadcast verbatim to the other members of `room`.
/// The server keeps no playback state.
pub async fn watch_party_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WatchPartyQuery>,
) -> Response {
    let Some(room) = validate_room_name(&query.room) else {
        return AppError::bad_request(
            "room must be 1-64 letters, digits, '-' or '_'",
        )
        .into_response();
    };
    ws.on_upgrade(move |socket| relay(socket, state, room))
}

async fn relay(socket: WebSocket, state: AppState, room: String) {
    let rooms = state.watch_party.clone();
    let membership = rooms.join(&room);
    let conn_id = membership.connection_id;
    let sender = membership.sender;
    let mut receiver = membership.receiver;
    debug!(%room, %conn_id, members = rooms.member_count(&room), "watch party join");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let forward = tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok((from, text)) if from != conn_id => {
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%conn_id, skipped, "watch party member lagging");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let _ = sender.send((conn_id, text.to_string()));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(%conn_id, error = %err, "watch party socket error");
                break;
            }
        }
    }

    forward.abort();
    let _ = forward.await;
    drop(sender);
    rooms.prune(&room);
    debug!(%room, %conn_id, "watch party leave");
}
