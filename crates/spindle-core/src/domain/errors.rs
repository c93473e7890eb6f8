//! Errors - タスクが失敗したときに record に保存される構造化エラー
//!
//! システムエラー（`crate::error::SchedulerError`）とは別物。
//! ここにあるのはタスクの「結果」としての失敗で、呼び出し側にはデータとして返る。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a task ended up Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The work unit returned an error.
    Execution,
    /// The work unit panicked.
    Panicked,
    /// Cancelled before or during execution.
    Cancelled,
    /// The per-task deadline passed while Running.
    Timeout,
}

/// Structured failure description stored in a Failed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Execution, message)
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Panicked, message)
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "task was cancelled")
    }

    pub fn timeout(after_ms: u64) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("task exceeded its deadline of {after_ms}ms"),
        )
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}
