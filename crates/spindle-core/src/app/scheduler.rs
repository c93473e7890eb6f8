//! TaskScheduler - エンジンの公開窓口
//!
//! submit → TaskStore::create → WorkerPool::enqueue。結果は取りに来てもらう（poll）。
//! 組み立ては `EngineBuilder` で行う。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::EngineConfig;
use super::status::{SchedulerStats, ShutdownReport};
use super::worker_pool::{Job, WorkerPool};
use crate::domain::{NewTask, OperationType, TaskId, TaskRecord, TaskStatus};
use crate::error::SchedulerError;
use crate::ports::TaskStore;
use crate::typed::OperationRegistry;

/// A request to run one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub operation_type: String,
    pub data_source: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Per-task deadline in milliseconds, measured from pickup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl SubmitRequest {
    pub fn new(operation_type: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            operation_type: operation_type.into(),
            data_source: String::new(),
            parameters,
            timeout_ms: None,
        }
    }

    pub fn with_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = data_source.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}

/// What `cancel` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// Was Pending; now Failed(cancelled) and will never execute.
    Cancelled,
    /// Was Running; its cancellation token has been fired.
    Signalled,
    /// Already terminal; nothing changed.
    AlreadyFinished,
}

/// Discards a created-but-unqueued record if `submit` is dropped mid-enqueue.
struct PendingRollback {
    store: Arc<dyn TaskStore>,
    id: TaskId,
    armed: bool,
}

impl PendingRollback {
    fn arm(store: Arc<dyn TaskStore>, id: TaskId) -> Self {
        Self {
            store,
            id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingRollback {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(task_id = %self.id, "no runtime to discard abandoned submission");
            return;
        };
        let store = Arc::clone(&self.store);
        let id = self.id;
        runtime.spawn(async move {
            match store.discard_pending(id).await {
                Ok(()) => debug!(task_id = %id, "discarded abandoned submission"),
                Err(err) => {
                    warn!(task_id = %id, error = %err, "failed to discard abandoned submission")
                }
            }
        });
    }
}

pub struct TaskScheduler {
    store: Arc<dyn TaskStore>,
    pool: WorkerPool,
    registry: Arc<OperationRegistry>,
    config: EngineConfig,
    reaper_stop: CancellationToken,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl TaskScheduler {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        pool: WorkerPool,
        registry: Arc<OperationRegistry>,
        config: EngineConfig,
        reaper_stop: CancellationToken,
        reaper: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            store,
            pool,
            registry,
            config,
            reaper_stop,
            reaper: Mutex::new(reaper),
        }
    }

    /// Create a Pending record and queue it. Returns as soon as the job is queued.
    pub async fn submit(&self, request: SubmitRequest) -> Result<TaskId, SchedulerError> {
        let operation_type = OperationType::new(request.operation_type).ok_or_else(|| {
            SchedulerError::InvalidRequest("operation_type must not be empty".to_string())
        })?;
        let unit = self.registry.get(operation_type.as_str()).ok_or_else(|| {
            SchedulerError::InvalidRequest(format!("unknown operation type '{operation_type}'"))
        })?;

        let id = self
            .store
            .create(NewTask {
                operation_type: operation_type.clone(),
                data_source: request.data_source,
                parameters: request.parameters,
                timeout: request.timeout_ms.map(Duration::from_millis),
            })
            .await?;

        // enqueue 待ちの間に future が drop されてもレコードを残さない
        let rollback = PendingRollback::arm(Arc::clone(&self.store), id);
        if let Err(err) = self.pool.enqueue(Job::new(id, unit)).await {
            // キューに入らなかったレコードは残さない
            if let Err(discard) = self.store.discard_pending(id).await {
                warn!(task_id = %id, error = %discard, "failed to discard rejected task");
            }
            rollback.disarm();
            debug!(task_id = %id, error = %err, "enqueue rejected");
            return Err(err);
        }
        rollback.disarm();

        info!(task_id = %id, %operation_type, "task submitted");
        Ok(id)
    }

    pub async fn get_status(&self, id: TaskId) -> Result<TaskRecord, SchedulerError> {
        self.store.get(id).await
    }

    /// Cancel a task. Pending tasks never run; Running tasks are signalled.
    pub async fn cancel(&self, id: TaskId) -> Result<CancelOutcome, SchedulerError> {
        let record = self.store.get(id).await?;
        let outcome = match record.status {
            TaskStatus::Pending => match self.store.cancel_pending(id).await {
                Ok(()) => {
                    self.pool.remove_queued(id);
                    CancelOutcome::Cancelled
                }
                // 読んだ直後にスロットが拾った
                Err(SchedulerError::InvalidTransition { from, .. }) if !from.is_terminal() => {
                    self.signal_running(id).await?
                }
                Err(SchedulerError::InvalidTransition { .. }) => CancelOutcome::AlreadyFinished,
                Err(err) => return Err(err),
            },
            TaskStatus::Running => self.signal_running(id).await?,
            TaskStatus::Completed | TaskStatus::Failed => CancelOutcome::AlreadyFinished,
        };
        info!(task_id = %id, ?outcome, "cancel requested");
        Ok(outcome)
    }

    async fn signal_running(&self, id: TaskId) -> Result<CancelOutcome, SchedulerError> {
        if self.pool.cancel_running(id) {
            return Ok(CancelOutcome::Signalled);
        }
        // トークンが無い = ちょうど終わったところ
        let record = self.store.get(id).await?;
        Ok(if record.status.is_terminal() {
            CancelOutcome::AlreadyFinished
        } else {
            CancelOutcome::Signalled
        })
    }

    /// Remove a finished record.
    pub async fn delete(&self, id: TaskId) -> Result<TaskRecord, SchedulerError> {
        self.store.delete(id).await
    }

    pub async fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            tasks: self.store.counts().await,
            pool: self.pool.stats(),
        }
    }

    /// Ready to take work: an idle slot or queue space, and not shutting down.
    pub fn is_ready(&self) -> bool {
        self.pool.has_capacity()
    }

    pub fn registered_operations(&self) -> Vec<String> {
        self.registry.registered_types()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stop the reaper, then drain the pool within `shutdown_timeout`.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.reaper_stop.cancel();
        if let Some(reaper) = self.reaper.lock().await.take() {
            let _ = reaper.await;
        }
        self.pool.shutdown(self.config.shutdown_timeout).await
    }
}
