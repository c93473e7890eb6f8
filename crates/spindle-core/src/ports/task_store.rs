//! TaskStore port - タスク状態の正本（source of truth）
//!
//! TaskRecord の変更はすべてここを通る。プール・スケジューラは
//! スナップショットを読むか、遷移をリクエストするだけ。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{NewTask, StatusCounts, TaskFailure, TaskId, TaskRecord};
use crate::error::SchedulerError;

/// Concurrent registry of task records.
///
/// # 設計原則
/// - 遷移は id ごとにアトミック。同じ id への同時 `transition_to_running` は
///   ちょうど 1 つだけ成功し、残りは `InvalidTransition`
/// - 異なる id の遷移は互いをブロックしない
/// - 読み取りは直前の遷移を必ず観測する
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a fresh Pending record and return its id.
    ///
    /// Fails with `CapacityExceeded` when an outstanding-task limit is
    /// configured and already reached.
    async fn create(&self, task: NewTask) -> Result<TaskId, SchedulerError>;

    /// Snapshot of a record.
    async fn get(&self, id: TaskId) -> Result<TaskRecord, SchedulerError>;

    /// Pending -> Running. Returns the snapshot taken right after the transition.
    async fn transition_to_running(&self, id: TaskId) -> Result<TaskRecord, SchedulerError>;

    /// Running -> Completed.
    async fn complete(&self, id: TaskId, result: serde_json::Value) -> Result<(), SchedulerError>;

    /// Running -> Failed.
    async fn fail(&self, id: TaskId, failure: TaskFailure) -> Result<(), SchedulerError>;

    /// Pending -> Failed(cancelled).
    async fn cancel_pending(&self, id: TaskId) -> Result<(), SchedulerError>;

    /// Remove a terminal record. Used by retention.
    async fn delete(&self, id: TaskId) -> Result<TaskRecord, SchedulerError>;

    /// Remove a Pending record that never made it into the queue.
    async fn discard_pending(&self, id: TaskId) -> Result<(), SchedulerError>;

    /// Remove every terminal record that finished strictly before `cutoff`.
    async fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> usize;

    async fn counts(&self) -> StatusCounts;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
