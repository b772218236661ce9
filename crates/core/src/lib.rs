//! Domain logic for the vLabs backend.
//!
//! Everything here is free of HTTP and persistence concerns:
//!
//! - [`progress`] turns raw child-process output into progress events and
//!   reduces them into run state.
//! - [`scripting`] covers the script catalog, runner selection, argument
//!   building and streaming subprocess execution.

pub mod error;
pub mod progress;
pub mod run_events;
pub mod scripting;
pub mod types;
