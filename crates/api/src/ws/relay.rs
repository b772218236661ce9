use std::sync::Arc;

use tokio::sync::broadcast;
use vlabs_events::RunEvent;

use crate::ws::frames;
use crate::ws::WsManager;

/// Forwards run events to the WebSocket client that started the run.
///
/// Events without a target client, or whose client has gone away, are
/// dropped.
pub struct RunRelay {
    ws_manager: Arc<WsManager>,
}

impl RunRelay {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the relay loop until the event bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<RunEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.relay(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Run relay lagged, frames were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, run relay shutting down");
                    break;
                }
            }
        }
    }

    async fn relay(&self, event: &RunEvent) {
        let Some(client_id) = event.client_id else {
            tracing::trace!(run_id = %event.run_id, "Run event has no client, not relayed");
            return;
        };

        let frame = frames::run_frame(event);
        if !self
            .ws_manager
            .send_to_client(&client_id, frames::to_message(&frame))
            .await
        {
            tracing::debug!(
                run_id = %event.run_id,
                client_id = %client_id,
                "Client not connected, dropping run frame"
            );
        }
    }
}
