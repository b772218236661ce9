//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] carries [`RunEvent`]s from the run orchestrator to the
//! WebSocket relay. It is shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use vlabs_core::progress::{ProgressEvent, ProgressSnapshot};
use vlabs_core::scripting::{OutputStream, RunStatus};
use vlabs_core::types::{ClientId, RunId};

// ---------------------------------------------------------------------------
// RunEvent
// ---------------------------------------------------------------------------

/// Something that happened during a script run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    pub script_id: String,
    /// WebSocket connection that started the run, if any.
    pub client_id: Option<ClientId>,
    pub timestamp: DateTime<Utc>,
    pub kind: RunEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEventKind {
    /// Process spawned. `command` has secrets masked.
    Started {
        command: String,
        parameters: serde_json::Value,
    },
    /// A plain output line.
    Output { stream: OutputStream, line: String },
    /// A structured progress event plus the overall percent after applying it.
    Progress { event: ProgressEvent, percent: f64 },
    /// A structured result object reported by the script.
    Result { data: serde_json::Value },
    /// Spawn failure, timeout, cancellation or a reported error.
    Error { message: String },
    /// The run reached a terminal state. Always the last event of a run.
    Finished {
        status: RunStatus,
        exit_code: Option<i32>,
        duration_ms: u64,
        progress: ProgressSnapshot,
    },
}

impl RunEvent {
    pub fn new(run_id: RunId, script_id: impl Into<String>, kind: RunEventKind) -> Self {
        Self {
            run_id,
            script_id: script_id.into(),
            client_id: None,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Address the event to a WebSocket client.
    pub fn with_client(mut self, client_id: Option<ClientId>) -> Self {
        self.client_id = client_id;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use vlabs_events::bus::{EventBus, RunEvent, RunEventKind};
///
/// let bus = EventBus::default();
/// let _rx = bus.subscribe();
///
/// bus.publish(RunEvent::new(
///     uuid::Uuid::new_v4(),
///     "jsnapy_runner",
///     RunEventKind::Error { message: "boom".into() },
/// ));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is silently dropped.
    pub fn publish(&self, event: RunEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
