//! Persisted record types.

pub mod run_record;

pub use run_record::{OutputTail, RunRecord, OUTPUT_TAIL_LINES};
