//! Status - プールとスケジューラの状態スナップショット

use serde::Serialize;

use crate::domain::StatusCounts;

/// Point-in-time view of the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub concurrency: usize,
    pub busy_slots: usize,
    pub queued: usize,
    pub queue_capacity: usize,
    /// Unexpected state-machine rejections seen by the slots. Should stay 0.
    pub transition_defects: u64,
    pub shutting_down: bool,
}

impl PoolStats {
    pub fn idle_slots(&self) -> usize {
        self.concurrency.saturating_sub(self.busy_slots)
    }
}

/// Returned by shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Everything finished before the timeout.
    pub drained: bool,
    /// Tasks still Pending or Running when the pool stopped.
    pub abandoned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub tasks: StatusCounts,
    pub pool: PoolStats,
}
