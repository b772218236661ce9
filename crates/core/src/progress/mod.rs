//! Progress-event protocol and stream reassembly.
//!
//! Child processes write line-delimited output where some lines (or parts of
//! lines) are JSON progress messages. The pipeline is:
//!
//! 1. [`assembler::LineAssembler`] rebuilds complete lines from raw chunks.
//! 2. [`scanner::split_segments`] locates JSON objects inside a line.
//! 3. [`protocol::classify_line`] turns segments into [`protocol::StreamLine`]s.
//! 4. [`reducer::ProgressTracker`] folds progress events into run state.

pub mod assembler;
pub mod protocol;
pub mod reducer;
pub mod scanner;

pub use assembler::LineAssembler;
pub use protocol::{classify_line, ProgressData, ProgressEvent, ProgressEventType, StreamLine};
pub use reducer::{ProgressSnapshot, ProgressTracker, StepState, StepStatus, TrackerStatus};
