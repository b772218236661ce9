use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use vlabs_core::types::ClientId;

use crate::state::AppState;
use crate::ws::frames;
use crate::ws::manager::WsManager;

/// Inbound frame from a browser client.
#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    frame_type: String,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` under a
/// fresh client id and managed by a sender task plus the receive loop.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.ws_manager))
}

/// Manage a single WebSocket connection after upgrade.
///
///   1. Registers the connection and queues the welcome frame.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Answers inbound pings on the current task.
///   4. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>) {
    let client_id: ClientId = uuid::Uuid::new_v4();
    tracing::info!(client_id = %client_id, "WebSocket connected");

    let mut rx = ws_manager.add(client_id).await;
    ws_manager
        .send_to_client(&client_id, frames::to_message(&frames::welcome(client_id)))
        .await;

    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(client_id = %client_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_text(&ws_manager, &client_id, text.as_str()).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(client_id = %client_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(client_id = %client_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&client_id).await;
    send_task.abort();
    tracing::info!(client_id = %client_id, "WebSocket disconnected");
}

async fn handle_text(ws_manager: &WsManager, client_id: &ClientId, text: &str) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) if frame.frame_type == "ping" => {
            ws_manager
                .send_to_client(client_id, frames::to_message(&frames::pong()))
                .await;
        }
        Ok(frame) => {
            tracing::debug!(client_id = %client_id, frame_type = %frame.frame_type, "Ignoring client frame");
        }
        Err(e) => {
            tracing::debug!(client_id = %client_id, error = %e, "Unparsable client frame");
        }
    }
}
