//! Script catalog, runner selection and streaming execution.
//!
//! All subprocess management is pure (no persistence, no HTTP) and lives in
//! the `core` crate for isolation and testability.

pub mod capabilities;
pub mod executor;
pub mod launcher;
pub mod manifest;
pub mod status;
pub mod subprocess;

pub use capabilities::{select_runner, Capabilities, RunnerKind};
pub use executor::{OutputLine, OutputStream, RunExit, ScriptError};
pub use launcher::{LaunchPlan, RunMode};
pub use manifest::{ParameterKind, ParameterSpec, ScriptCatalog, ScriptDescriptor};
pub use status::RunStatus;
