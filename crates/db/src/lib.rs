//! Persistence for vLabs run history.
//!
//! History lives in a single JSON file rather than a database: the volume is
//! a few dozen runs and the file doubles as a human-readable audit trail.

pub mod history;
pub mod models;

pub use history::{HistoryError, HistoryStore};
