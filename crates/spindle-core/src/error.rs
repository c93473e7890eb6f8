use thiserror::Error;

use crate::domain::{TaskId, TaskStatus};

/// Errors returned by the store, the pool and the scheduler façade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Bad input from the caller (blank or unknown operation type, ...). Not retried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// A transition the state machine does not allow. Indicates a race or a bug,
    /// never a caller error.
    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("too many outstanding tasks (limit={limit})")]
    CapacityExceeded { limit: usize },

    #[error("work queue is full (capacity={capacity})")]
    QueueFull { capacity: usize },

    #[error("scheduler is shutting down")]
    ShuttingDown,
}

impl SchedulerError {
    /// Stable machine-readable code, used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::InvalidRequest(_) => "invalid_request",
            SchedulerError::NotFound(_) => "not_found",
            SchedulerError::InvalidTransition { .. } => "invalid_transition",
            SchedulerError::CapacityExceeded { .. } => "capacity_exceeded",
            SchedulerError::QueueFull { .. } => "queue_full",
            SchedulerError::ShuttingDown => "shutting_down",
        }
    }

    /// Overload errors: the caller should try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulerError::CapacityExceeded { .. } | SchedulerError::QueueFull { .. }
        )
    }
}
