//! WorkerPool - 固定数のスロットでタスクを実行する
//!
//! # フロー（スロット 1 つあたり）
//! 1. WorkQueue::pop() で Job を取得（close 済みかつ空なら終了）
//! 2. キャンセル用トークンを登録してから TaskStore::transition_to_running()
//! 3. WorkUnit を別 tokio タスクで実行（panic は JoinError として回収）
//! 4. TaskStore::complete() / fail() で結果を反映
//!
//! # 設計原則
//! - スロットは WorkUnit が何をしても死なない
//! - 期限切れは即 Failed(timeout) にするが、スロットは unit の終了を待つ
//!   （同時実行数 = concurrency を厳守）。遅れて返った結果は捨てる

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::config::EngineConfig;
use super::status::{PoolStats, ShutdownReport};
use crate::domain::{TaskEnvelope, TaskFailure, TaskId};
use crate::error::SchedulerError;
use crate::impls::{Backpressure, WorkQueue};
use crate::ports::TaskStore;
use crate::typed::{WorkContext, WorkError, WorkUnit};

/// One queued unit of work: the record id and the unit that will run it.
#[derive(Clone)]
pub struct Job {
    pub task_id: TaskId,
    pub unit: Arc<dyn WorkUnit>,
}

impl Job {
    pub fn new(task_id: TaskId, unit: Arc<dyn WorkUnit>) -> Self {
        Self { task_id, unit }
    }
}

struct PoolShared {
    store: Arc<dyn TaskStore>,
    queue: WorkQueue<Job>,
    backpressure: Backpressure,
    default_timeout: Option<Duration>,
    concurrency: usize,
    /// Tokens of Running tasks. Registered before pickup so a cancel that
    /// observes Running always finds one.
    running: Mutex<HashMap<TaskId, CancellationToken>>,
    /// Parent of every unit token; fired when shutdown gives up waiting.
    root: CancellationToken,
    busy: AtomicUsize,
    transition_defects: AtomicU64,
    shutting_down: AtomicBool,
}

/// Bounded set of execution slots fed by a FIFO queue.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    slots: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `config.concurrency` slots. Must be called inside a tokio runtime.
    pub fn start(config: &EngineConfig, store: Arc<dyn TaskStore>) -> Self {
        let shared = Arc::new(PoolShared {
            store,
            queue: WorkQueue::new(config.queue_capacity),
            backpressure: config.backpressure,
            default_timeout: config.default_task_timeout,
            concurrency: config.concurrency,
            running: Mutex::new(HashMap::new()),
            root: CancellationToken::new(),
            busy: AtomicUsize::new(0),
            transition_defects: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        });

        let slots = (0..config.concurrency)
            .map(|slot| {
                let shared = Arc::clone(&shared);
                tokio::spawn(slot_loop(slot, shared))
            })
            .collect();

        info!(
            concurrency = config.concurrency,
            queue_capacity = config.queue_capacity,
            "worker pool started"
        );

        Self {
            shared,
            slots: Mutex::new(slots),
        }
    }

    /// Hand a job to the slots, applying the configured backpressure policy.
    pub async fn enqueue(&self, job: Job) -> Result<(), SchedulerError> {
        if self.shared.shutting_down.load(Ordering::Acquire) {
            return Err(SchedulerError::ShuttingDown);
        }
        self.shared.queue.push(job, self.shared.backpressure).await
    }

    /// Fire the cancellation token of a Running task. `false` if none is registered.
    pub fn cancel_running(&self, id: TaskId) -> bool {
        match self.shared.running_token(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop a job that no slot has picked up yet.
    pub fn remove_queued(&self, id: TaskId) -> bool {
        self.shared.queue.remove_first(|job| job.task_id == id).is_some()
    }

    /// Stop accepting work, drain until `timeout`, then abort whatever is left.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        self.shared.shutting_down.store(true, Ordering::Release);
        self.shared.queue.close();

        let mut slots = std::mem::take(&mut *self.shared_slots());
        let drained = tokio::time::timeout(timeout, async {
            for slot in slots.iter_mut() {
                // JoinError はスロットの abort のみ。ここでは無視してよい
                let _ = slot.await;
            }
        })
        .await
        .is_ok();

        if !drained {
            self.shared.root.cancel();
            for slot in &slots {
                slot.abort();
            }
        }

        let abandoned = self.shared.store.counts().await.outstanding();
        if drained {
            info!(abandoned, "worker pool drained");
        } else {
            warn!(
                abandoned,
                timeout_ms = timeout.as_millis() as u64,
                "worker pool shutdown timed out; slots aborted"
            );
        }
        ShutdownReport { drained, abandoned }
    }

    pub fn stats(&self) -> PoolStats {
        let shared = &self.shared;
        PoolStats {
            concurrency: shared.concurrency,
            busy_slots: shared.busy.load(Ordering::Acquire),
            queued: shared.queue.len(),
            queue_capacity: shared.queue.capacity(),
            transition_defects: shared.transition_defects.load(Ordering::Relaxed),
            shutting_down: shared.shutting_down.load(Ordering::Acquire),
        }
    }

    /// At least one idle slot or free queue space, and not shutting down.
    pub fn has_capacity(&self) -> bool {
        let stats = self.stats();
        !stats.shutting_down && (stats.idle_slots() > 0 || stats.queued < stats.queue_capacity)
    }

    fn shared_slots(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.queue.close();
        self.shared.root.cancel();
    }
}

/// Decrements the busy counter even if the slot is aborted mid-job.
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

async fn slot_loop(slot: usize, shared: Arc<PoolShared>) {
    while let Some(job) = shared.queue.pop().await {
        let _busy = BusyGuard::enter(&shared.busy);
        let span = info_span!("task", slot, task_id = %job.task_id);
        shared.run_job(job).instrument(span).await;
    }
    debug!(slot, "queue closed; slot exiting");
}

impl PoolShared {
    fn running_map(&self) -> std::sync::MutexGuard<'_, HashMap<TaskId, CancellationToken>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn running_token(&self, id: TaskId) -> Option<CancellationToken> {
        self.running_map().get(&id).cloned()
    }

    async fn run_job(&self, job: Job) {
        let id = job.task_id;
        let token = self.root.child_token();
        self.running_map().insert(id, token.clone());

        let record = match self.store.transition_to_running(id).await {
            Ok(record) => record,
            Err(err) => {
                self.running_map().remove(&id);
                match err {
                    // 取り出し前に cancel された
                    SchedulerError::InvalidTransition { from, .. } if from.is_terminal() => {
                        debug!(status = %from, "task already finished before pickup; skipping");
                    }
                    other => self.defect(&other),
                }
                return;
            }
        };

        debug!(operation_type = %record.operation_type, "task started");
        let timeout = record.timeout().or(self.default_timeout);
        let ctx = WorkContext::new(TaskEnvelope::from(&record), token.clone());
        let unit = job.unit;
        let mut handle = tokio::spawn(async move { unit.run(ctx).await });

        let joined = match timeout {
            None => (&mut handle).await,
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    token.cancel();
                    let after_ms = limit.as_millis() as u64;
                    match self.store.fail(id, TaskFailure::timeout(after_ms)).await {
                        Ok(()) => warn!(timeout_ms = after_ms, "task timed out"),
                        Err(err) => self.defect(&err),
                    }
                    // 同時実行数を守るため、unit の終了までスロットを占有する
                    let _ = handle.await;
                    debug!("late result of timed-out task discarded");
                    self.running_map().remove(&id);
                    return;
                }
            },
        };
        self.running_map().remove(&id);

        match outcome(joined) {
            Ok(result) => match self.store.complete(id, result).await {
                Ok(()) => info!("task completed"),
                Err(err) => self.defect(&err),
            },
            Err(failure) => {
                let kind = failure.kind;
                match self.store.fail(id, failure).await {
                    Ok(()) => warn!(?kind, "task failed"),
                    Err(err) => self.defect(&err),
                }
            }
        }
    }

    fn defect(&self, err: &SchedulerError) {
        if matches!(err, SchedulerError::InvalidTransition { .. }) {
            self.transition_defects.fetch_add(1, Ordering::Relaxed);
        }
        error!(error = %err, code = err.code(), "unexpected store error in worker slot");
    }
}

fn outcome(joined: Result<Result<Value, WorkError>, JoinError>) -> Result<Value, TaskFailure> {
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.into()),
        Err(err) if err.is_panic() => Err(TaskFailure::panicked(panic_message(err.into_panic()))),
        Err(_) => Err(TaskFailure::cancelled()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("work unit panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("work unit panicked: {s}")
    } else {
        "work unit panicked".to_string()
    }
}
