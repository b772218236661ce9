//! Script run orchestration.
//!
//! The [`RunOrchestrator`](orchestrator::RunOrchestrator) ties the core
//! launcher and progress reducer to the event bus and the history store.

pub mod orchestrator;

pub use orchestrator::{ActiveRunInfo, LaunchSettings, RunOrchestrator, RunRequest};
