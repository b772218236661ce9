//! Lifecycle status of a script run.

use serde::{Deserialize, Serialize};

use crate::progress::TrackerStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepted but the process has not been spawned yet.
    Pending,
    /// Process is running.
    Running,
    /// Process exited with code 0 and reported no failure.
    Completed,
    /// Process exited non-zero, reported a failure, or could not start.
    Failed,
    /// Cancelled by a user request.
    Cancelled,
    /// Killed because it exceeded its configured timeout.
    TimedOut,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        }
    }
}

impl From<TrackerStatus> for RunStatus {
    fn from(status: TrackerStatus) -> Self {
        match status {
            TrackerStatus::Idle => Self::Pending,
            TrackerStatus::Running => Self::Running,
            TrackerStatus::Completed => Self::Completed,
            TrackerStatus::Failed => Self::Failed,
        }
    }
}
