//! Run history record.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use vlabs_core::progress::ProgressSnapshot;
use vlabs_core::scripting::RunStatus;
use vlabs_core::types::{RunId, Timestamp};

/// Output lines kept per run.
pub const OUTPUT_TAIL_LINES: usize = 200;

/// One finished (or interrupted) script run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: RunId,
    pub script_id: String,
    /// Request parameters with secret values masked.
    pub parameters: serde_json::Value,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub duration_ms: Option<u64>,
    pub percent: f64,
    /// Final step list, last message and reported errors.
    #[serde(default)]
    pub progress: ProgressSnapshot,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub output_tail: Vec<String>,
}

/// Ring buffer of the last [`OUTPUT_TAIL_LINES`] output lines.
#[derive(Debug, Clone)]
pub struct OutputTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl OutputTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(OUTPUT_TAIL_LINES)),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.lines.into()
    }
}

impl Default for OutputTail {
    fn default() -> Self {
        Self::new(OUTPUT_TAIL_LINES)
    }
}
