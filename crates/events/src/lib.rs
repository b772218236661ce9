//! vLabs run event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`RunEvent`]: the envelope for everything that happens during a script
//!   run, consumed by the WebSocket relay.

pub mod bus;

pub use bus::{EventBus, RunEvent, RunEventKind};
