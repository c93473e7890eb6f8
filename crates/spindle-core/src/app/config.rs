//! EngineConfig - エンジン全体の設定値
//!
//! 環境変数の読み込みはサーバ側の責務。ここは値の型と既定値だけ持つ。

use std::time::Duration;

pub use crate::impls::Backpressure;

/// Retention loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Terminal records older than this (by `finished_at`) are removed.
    pub max_age: Duration,
    /// How often the reaper wakes up.
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of worker slots (max tasks Running at once).
    pub concurrency: usize,
    /// Bound of the FIFO between submit and the slots.
    pub queue_capacity: usize,
    pub backpressure: Backpressure,
    /// Pending + Running limit enforced by the store. `None` = unlimited.
    pub max_outstanding: Option<usize>,
    /// Deadline applied when a request does not carry its own.
    pub default_task_timeout: Option<Duration>,
    /// How long shutdown waits for queued and in-flight work.
    pub shutdown_timeout: Duration,
    pub retention: Option<RetentionConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            queue_capacity: 1024,
            backpressure: Backpressure::Reject,
            max_outstanding: None,
            default_task_timeout: None,
            shutdown_timeout: Duration::from_secs(30),
            retention: None,
        }
    }
}

impl EngineConfig {
    /// Reject settings that would leave the engine unable to run anything.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be at least 1".to_string());
        }
        if let Some(limit) = self.max_outstanding
            && limit == 0
        {
            return Err("max_outstanding must be at least 1 when set".to_string());
        }
        if let Some(retention) = &self.retention
            && retention.interval.is_zero()
        {
            return Err("retention interval must be non-zero".to_string());
        }
        Ok(())
    }
}
