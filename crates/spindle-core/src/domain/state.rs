//! Task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a task.
///
/// State transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Failed (work failure, panic, timeout)
/// - Pending -> Failed (cancelled before a slot picked it up)
///
/// Completed / Failed は終端。以降は一切変化しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted and waiting in the queue.
    Pending,

    /// Picked up by a worker slot.
    Running,

    /// The work unit returned a result.
    Completed,

    /// The work unit failed, panicked, timed out, or the task was cancelled.
    Failed,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }

    /// Position in the Pending → Running → terminal walk.
    pub fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Number of tasks per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }

    /// Pending + Running.
    pub fn outstanding(&self) -> usize {
        self.pending + self.running
    }

    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pickup(TaskStatus::Pending, TaskStatus::Running)]
    #[case::cancel(TaskStatus::Pending, TaskStatus::Failed)]
    #[case::success(TaskStatus::Running, TaskStatus::Completed)]
    #[case::failure(TaskStatus::Running, TaskStatus::Failed)]
    fn allowed_edges(#[case] from: TaskStatus, #[case] to: TaskStatus) {
        assert!(from.can_transition_to(to));
    }

    #[rstest]
    #[case::skip_running(TaskStatus::Pending, TaskStatus::Completed)]
    #[case::regress(TaskStatus::Running, TaskStatus::Pending)]
    #[case::double_pickup(TaskStatus::Running, TaskStatus::Running)]
    #[case::reopen(TaskStatus::Completed, TaskStatus::Running)]
    #[case::flip(TaskStatus::Completed, TaskStatus::Failed)]
    #[case::revive(TaskStatus::Failed, TaskStatus::Completed)]
    fn rejected_edges(#[case] from: TaskStatus, #[case] to: TaskStatus) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn serializes_snake_case() {
        let s = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(s, "\"running\"");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn counts_track_outstanding() {
        let mut counts = StatusCounts::default();
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            counts.add(status);
        }
        assert_eq!(counts.outstanding(), 3);
        assert_eq!(counts.total(), 5);
    }
}
