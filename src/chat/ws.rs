use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::chat::dto::{ClientEvent, ServerEvent};
use crate::chat::hub::ConnId;
use crate::chat::services;
use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_session(state, socket))
}

/// One connected client, driven until the socket closes. The connection joins
/// the hub when the client announces its identity and leaves when it goes away;
/// events queued for it meanwhile are forwarded by the writer task.
async fn client_session(state: AppState, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "serialize server event failed");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut session: Option<(Uuid, ConnId)> = None;

    while let Some(Ok(frame)) = stream.next().await {
        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<ClientEvent>(&text) {
            Ok(ClientEvent::Join { user_id }) => {
                // Re-joining under a new identity releases the old one.
                if let Some((old_id, old_conn)) = session.take() {
                    state.chat.leave(old_id, old_conn);
                }
                let conn = state.chat.join(user_id, tx.clone());
                session = Some((user_id, conn));
                debug!(%user_id, "socket joined");
            }
            Ok(ClientEvent::SendMessage {
                sender_id,
                receiver_id,
                content,
                timestamp,
            }) => {
                if let Err(e) =
                    services::send_message(&state, sender_id, receiver_id, &content, timestamp)
                        .await
                {
                    warn!(error = %e, %sender_id, %receiver_id, "sendMessage rejected");
                    let _ = tx.send(ServerEvent::ErrorMessage {
                        message: e.to_string(),
                    });
                }
            }
            Err(e) => {
                warn!(error = %e, "unparseable client event");
                let _ = tx.send(ServerEvent::ErrorMessage {
                    message: "Unrecognized event".into(),
                });
            }
        }
    }

    if let Some((user_id, conn)) = session {
        state.chat.leave(user_id, conn);
        debug!(%user_id, "socket left");
    }

    // Close our side of the event channel so the writer drains and exits.
    drop(tx);
    let _ = writer.await;
}
