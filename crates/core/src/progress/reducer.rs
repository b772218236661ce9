//! Progress-stream reducer.
//!
//! [`ProgressTracker`] folds a sequence of [`ProgressEvent`]s into the state
//! a live view needs: overall status, ordered step list and percent
//! complete.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::protocol::{ProgressEvent, ProgressEventType};

/// Overall state of a tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl TrackerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// State of one numbered step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepState {
    pub step: u32,
    pub name: Option<String>,
    pub message: String,
    pub status: StepStatus,
}

/// Serializable view of a tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub status: TrackerStatus,
    pub percent: f64,
    pub total_steps: Option<u32>,
    pub completed_steps: u32,
    pub steps: Vec<StepState>,
    pub last_message: Option<String>,
    pub errors: Vec<String>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        ProgressTracker::new().snapshot()
    }
}

/// Accumulates progress events for a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressTracker {
    status: TrackerStatus,
    steps: BTreeMap<u32, StepState>,
    total_steps: Option<u32>,
    percent: f64,
    last_message: Option<String>,
    errors: Vec<String>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            status: TrackerStatus::Idle,
            steps: BTreeMap::new(),
            total_steps: None,
            percent: 0.0,
            last_message: None,
            errors: Vec::new(),
        }
    }

    pub fn status(&self) -> TrackerStatus {
        self.status
    }

    /// Percent complete in `0.0..=100.0`.
    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn total_steps(&self) -> Option<u32> {
        self.total_steps
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Steps in step-number order.
    pub fn steps(&self) -> impl Iterator<Item = &StepState> {
        self.steps.values()
    }

    pub fn completed_steps(&self) -> u32 {
        self.steps
            .values()
            .filter(|s| s.status == StepStatus::Completed)
            .count() as u32
    }

    /// Apply one event. Returns `true` when the tracker state changed.
    ///
    /// Events arriving after a terminal state are ignored.
    pub fn apply(&mut self, event: &ProgressEvent) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let before = self.clone();
        self.status = TrackerStatus::Running;

        if let Some(total) = event.data.total_steps.filter(|t| *t > 0) {
            self.total_steps = Some(total);
        }
        if !event.message.is_empty() {
            self.last_message = Some(event.message.clone());
        }

        match event.event_type {
            ProgressEventType::StepStart | ProgressEventType::StepProgress => {
                self.upsert_step(event, StepStatus::Running);
            }
            ProgressEventType::StepComplete => {
                let status = if event.data.reports_failure() {
                    StepStatus::Failed
                } else {
                    StepStatus::Completed
                };
                self.upsert_step(event, status);
            }
            ProgressEventType::OperationComplete => {
                if event.data.reports_failure() {
                    self.fail(&event.message);
                } else {
                    self.status = TrackerStatus::Completed;
                    self.percent = 100.0;
                }
            }
            ProgressEventType::Error => self.fail(&event.message),
            ProgressEventType::OperationStart
            | ProgressEventType::Info
            | ProgressEventType::Warning
            | ProgressEventType::Unknown => {}
        }

        if self.status == TrackerStatus::Running {
            self.advance_percent(event.data.percent);
        }
        *self != before
    }

    /// Terminal transition driven by the process exit.
    ///
    /// A non-zero (or missing) exit code always ends in `Failed`, even if the
    /// script already reported completion.
    pub fn finish(&mut self, exit_code: Option<i32>) -> TrackerStatus {
        match exit_code {
            Some(0) => {
                if !self.status.is_terminal() {
                    self.status = TrackerStatus::Completed;
                    self.percent = 100.0;
                }
            }
            Some(code) => {
                if self.status != TrackerStatus::Failed {
                    self.fail(&format!("Process exited with code {code}"));
                }
            }
            None => {
                if self.status != TrackerStatus::Failed {
                    self.fail("Process terminated by signal");
                }
            }
        }
        self.status
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status,
            percent: self.percent,
            total_steps: self.total_steps,
            completed_steps: self.completed_steps(),
            steps: self.steps.values().cloned().collect(),
            last_message: self.last_message.clone(),
            errors: self.errors.clone(),
        }
    }

    fn upsert_step(&mut self, event: &ProgressEvent, status: StepStatus) {
        let Some(step) = event.data.step else {
            return;
        };
        let entry = self.steps.entry(step).or_insert_with(|| StepState {
            step,
            name: None,
            message: String::new(),
            status,
        });
        // A late STEP_START must not reopen a finished step.
        if status >= entry.status {
            entry.status = status;
            if !event.message.is_empty() {
                entry.message = event.message.clone();
            }
        }
        if let Some(name) = &event.data.name {
            entry.name = Some(name.clone());
        }
    }

    fn fail(&mut self, message: &str) {
        self.status = TrackerStatus::Failed;
        if !message.is_empty() {
            self.errors.push(message.to_string());
        }
        for step in self.steps.values_mut() {
            if step.status == StepStatus::Running {
                step.status = StepStatus::Failed;
            }
        }
    }

    fn advance_percent(&mut self, explicit: Option<f64>) {
        let derived = match (explicit, self.total_steps) {
            (Some(p), _) if p.is_finite() => Some(p),
            (_, Some(total)) => {
                let done = self.completed_steps().min(total);
                Some(f64::from(done) / f64::from(total) * 100.0)
            }
            _ => None,
        };
        if let Some(p) = derived {
            self.percent = self.percent.max(p.clamp(0.0, 100.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::protocol::ProgressEventType as T;

    fn ev(t: T) -> ProgressEvent {
        ProgressEvent::new(t, "")
    }

    #[test]
    fn starts_idle_at_zero() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.status(), TrackerStatus::Idle);
        assert_eq!(tracker.percent(), 0.0);
    }

    #[test]
    fn percent_follows_completed_steps() {
        let mut t = ProgressTracker::new();
        t.apply(&ev(T::OperationStart).with_step(0, Some(4)));
        assert_eq!(t.status(), TrackerStatus::Running);

        t.apply(&ev(T::StepStart).with_step(1, None));
        assert_eq!(t.percent(), 0.0);
        t.apply(&ev(T::StepComplete).with_step(1, None));
        assert_eq!(t.percent(), 25.0);
        t.apply(&ev(T::StepComplete).with_step(2, None));
        assert_eq!(t.percent(), 50.0);
        assert_eq!(t.completed_steps(), 2);
    }

    #[test]
    fn explicit_percent_wins_but_never_decreases() {
        let mut t = ProgressTracker::new();
        let mut e = ev(T::StepProgress);
        e.data.percent = Some(60.0);
        t.apply(&e);
        assert_eq!(t.percent(), 60.0);

        e.data.percent = Some(30.0);
        t.apply(&e);
        assert_eq!(t.percent(), 60.0);

        e.data.percent = Some(250.0);
        t.apply(&e);
        assert_eq!(t.percent(), 100.0);
        assert_eq!(t.status(), TrackerStatus::Running);
    }

    #[test]
    fn out_of_order_steps_are_sorted_and_not_reopened() {
        let mut t = ProgressTracker::new();
        t.apply(&ev(T::StepComplete).with_step(2, Some(3)));
        t.apply(&ev(T::StepStart).with_step(1, None));
        // Late start for an already completed step.
        t.apply(&ev(T::StepStart).with_step(2, None));

        let steps: Vec<_> = t.steps().map(|s| (s.step, s.status)).collect();
        assert_eq!(
            steps,
            vec![(1, StepStatus::Running), (2, StepStatus::Completed)]
        );
    }

    #[test]
    fn duplicate_step_events_do_not_double_count() {
        let mut t = ProgressTracker::new();
        t.apply(&ev(T::StepComplete).with_step(1, Some(2)));
        t.apply(&ev(T::StepComplete).with_step(1, Some(2)));
        assert_eq!(t.completed_steps(), 1);
        assert_eq!(t.percent(), 50.0);
    }

    #[test]
    fn operation_complete_sets_hundred() {
        let mut t = ProgressTracker::new();
        t.apply(&ev(T::StepComplete).with_step(1, Some(10)));
        t.apply(&ev(T::OperationComplete));
        assert_eq!(t.status(), TrackerStatus::Completed);
        assert_eq!(t.percent(), 100.0);
    }

    #[test]
    fn failed_operation_complete_marks_failure() {
        let mut t = ProgressTracker::new();
        t.apply(&ev(T::StepComplete).with_step(1, Some(4)));
        let mut done = ProgressEvent::new(T::OperationComplete, "2 of 4 tests failed");
        done.data.status = Some("FAILED".into());
        t.apply(&done);
        assert_eq!(t.status(), TrackerStatus::Failed);
        assert_eq!(t.percent(), 25.0);
        assert_eq!(t.errors(), ["2 of 4 tests failed"]);
    }

    #[test]
    fn error_keeps_percent_and_fails_running_steps() {
        let mut t = ProgressTracker::new();
        t.apply(&ev(T::StepComplete).with_step(1, Some(2)));
        t.apply(&ev(T::StepStart).with_step(2, None));
        t.apply(&ProgressEvent::new(T::Error, "SSH timeout"));

        assert_eq!(t.status(), TrackerStatus::Failed);
        assert_eq!(t.percent(), 50.0);
        let last = t.steps().last().expect("step 2");
        assert_eq!(last.status, StepStatus::Failed);
    }

    #[test]
    fn events_after_terminal_are_ignored() {
        let mut t = ProgressTracker::new();
        t.apply(&ev(T::OperationComplete));
        assert!(!t.apply(&ProgressEvent::new(T::Error, "late")));
        assert_eq!(t.status(), TrackerStatus::Completed);
        assert!(t.errors().is_empty());
    }

    #[test]
    fn apply_reports_only_real_changes() {
        let mut t = ProgressTracker::new();
        assert!(t.apply(&ev(T::Info)), "idle to running is a change");
        assert!(!t.apply(&ev(T::Info)));

        let step = ev(T::StepComplete).with_step(1, Some(2));
        assert!(t.apply(&step));
        assert!(!t.apply(&step), "duplicate step completion");
        assert!(t.apply(&ProgressEvent::new(T::Warning, "disk almost full")));
    }

    #[test]
    fn finish_with_success_exit() {
        let mut t = ProgressTracker::new();
        t.apply(&ev(T::StepStart).with_step(1, Some(3)));
        assert_eq!(t.finish(Some(0)), TrackerStatus::Completed);
        assert_eq!(t.percent(), 100.0);
    }

    #[test]
    fn finish_with_failure_exit_overrides_completion() {
        let mut t = ProgressTracker::new();
        t.apply(&ev(T::OperationComplete));
        assert_eq!(t.finish(Some(2)), TrackerStatus::Failed);
        assert_eq!(t.errors(), ["Process exited with code 2"]);
    }

    #[test]
    fn finish_without_exit_code() {
        let mut t = ProgressTracker::new();
        assert_eq!(t.finish(None), TrackerStatus::Failed);
        assert_eq!(t.errors(), ["Process terminated by signal"]);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let mut t = ProgressTracker::new();
        let mut start = ProgressEvent::new(T::StepStart, "Backing up r1").with_step(1, Some(2));
        start.data.name = Some("backup".into());
        t.apply(&start);

        let value = serde_json::to_value(t.snapshot()).expect("serialize");
        assert_eq!(value["status"], "running");
        assert_eq!(value["totalSteps"], 2);
        assert_eq!(value["completedSteps"], 0);
        assert_eq!(value["lastMessage"], "Backing up r1");
        assert_eq!(value["steps"][0]["name"], "backup");
        assert_eq!(value["steps"][0]["status"], "running");
    }
}
