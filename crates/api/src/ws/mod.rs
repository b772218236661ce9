//! WebSocket infrastructure for live script runs.
//!
//! Provides connection management, heartbeat, the HTTP upgrade handler and
//! the relay that turns run events into frames for the requesting client.

pub mod frames;
mod handler;
mod heartbeat;
pub mod manager;
mod relay;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
pub use relay::RunRelay;
