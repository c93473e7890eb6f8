//! Task record: identity + lifecycle fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{OperationType, TaskFailure, TaskId, TaskStatus};
use crate::error::SchedulerError;

/// What a caller hands to the store when creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub operation_type: OperationType,
    pub data_source: String,
    pub parameters: serde_json::Value,
    /// Deadline measured from pickup.
    pub timeout: Option<Duration>,
}

/// Single source of truth for one task.
///
/// Only the store mutates a record, through the transition methods below,
/// which refuse any edge the state machine does not allow. Everyone else
/// works on snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(rename = "task_id")]
    pub id: TaskId,
    pub operation_type: OperationType,
    pub data_source: String,
    pub parameters: serde_json::Value,
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl TaskRecord {
    pub fn new(id: TaskId, task: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            operation_type: task.operation_type,
            data_source: task.data_source,
            parameters: task.parameters,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            timeout_ms: task.timeout.map(|d| d.as_millis() as u64),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Pending -> Running.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.expect(TaskStatus::Pending, TaskStatus::Running)?;
        self.status = TaskStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Running -> Completed.
    pub fn complete(
        &mut self,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        self.expect(TaskStatus::Running, TaskStatus::Completed)?;
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.finished_at = Some(now);
        Ok(())
    }

    /// Running -> Failed.
    pub fn fail(&mut self, failure: TaskFailure, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.expect(TaskStatus::Running, TaskStatus::Failed)?;
        self.status = TaskStatus::Failed;
        self.error = Some(failure);
        self.finished_at = Some(now);
        Ok(())
    }

    /// Pending -> Failed(cancelled). The only way to leave Pending without running.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.expect(TaskStatus::Pending, TaskStatus::Failed)?;
        self.status = TaskStatus::Failed;
        self.error = Some(TaskFailure::cancelled());
        self.finished_at = Some(now);
        Ok(())
    }

    fn expect(&self, from: TaskStatus, to: TaskStatus) -> Result<(), SchedulerError> {
        if self.status == from && from.can_transition_to(to) {
            Ok(())
        } else {
            Err(SchedulerError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureKind;
    use serde_json::json;
    use ulid::Ulid;

    fn record() -> TaskRecord {
        let task = NewTask {
            operation_type: OperationType::new("echo").unwrap(),
            data_source: "x".to_string(),
            parameters: json!({"n": 3}),
            timeout: Some(Duration::from_millis(1500)),
        };
        TaskRecord::new(TaskId::from_ulid(Ulid::new()), task, Utc::now())
    }

    #[test]
    fn new_record_is_pending_and_bare() {
        let r = record();
        assert_eq!(r.status, TaskStatus::Pending);
        assert!(r.result.is_none());
        assert!(r.error.is_none());
        assert!(r.started_at.is_none());
        assert!(r.finished_at.is_none());
        assert_eq!(r.timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn happy_path_sets_each_timestamp_once() {
        let mut r = record();
        r.start(Utc::now()).unwrap();
        let started = r.started_at;
        r.complete(json!({"n": 3}), Utc::now()).unwrap();

        assert_eq!(r.status, TaskStatus::Completed);
        assert_eq!(r.started_at, started);
        assert_eq!(r.result, Some(json!({"n": 3})));
        assert!(r.error.is_none());
        assert!(r.finished_at.is_some());
    }

    #[test]
    fn double_start_is_rejected() {
        let mut r = record();
        r.start(Utc::now()).unwrap();
        let err = r.start(Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidTransition {
                from: TaskStatus::Running,
                to: TaskStatus::Running,
                ..
            }
        ));
    }

    #[test]
    fn fail_requires_running() {
        let mut r = record();
        assert!(r.fail(TaskFailure::execution("boom"), Utc::now()).is_err());
        assert_eq!(r.status, TaskStatus::Pending);
    }

    #[test]
    fn cancel_only_from_pending() {
        let mut r = record();
        r.cancel(Utc::now()).unwrap();
        assert_eq!(r.status, TaskStatus::Failed);
        assert_eq!(r.error.as_ref().map(|e| e.kind), Some(FailureKind::Cancelled));
        assert!(r.started_at.is_none());

        let mut running = record();
        running.start(Utc::now()).unwrap();
        assert!(running.cancel(Utc::now()).is_err());
    }

    #[test]
    fn terminal_records_are_frozen() {
        let mut r = record();
        r.start(Utc::now()).unwrap();
        r.fail(TaskFailure::execution("boom"), Utc::now()).unwrap();
        assert!(r.complete(json!(1), Utc::now()).is_err());
        assert!(r.result.is_none());
    }

    #[test]
    fn serializes_id_as_task_id() {
        let r = record();
        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["task_id"], json!(r.id.to_string()));
        assert!(value.get("id").is_none());
    }
}
