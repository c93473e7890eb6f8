//! InMemoryTaskStore - プロセス内のタスク正本
//!
//! # 実装詳細
//! - `RwLock<HashMap<TaskId, Arc<Mutex<TaskRecord>>>>`
//!   - map の RwLock は挿入・削除だけに使い、遷移中は握らない
//!   - record ごとの Mutex で id 単位の排他を取る
//! - ロック順は必ず map → record（逆はない）
//! - outstanding (Pending + Running) はカウンタで持ち、上限チェックを O(1) にする

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::domain::{NewTask, StatusCounts, TaskFailure, TaskId, TaskRecord, TaskStatus};
use crate::error::SchedulerError;
use crate::ports::{Clock, IdGenerator, SystemClock, TaskStore, UlidGenerator};

type Entry = Arc<Mutex<TaskRecord>>;

pub struct InMemoryTaskStore {
    records: RwLock<HashMap<TaskId, Entry>>,
    outstanding: AtomicUsize,
    max_outstanding: Option<usize>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self::with_parts(clock, ids)
    }

    pub fn with_parts(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            outstanding: AtomicUsize::new(0),
            max_outstanding: None,
            clock,
            ids,
        }
    }

    /// Limit the number of Pending + Running tasks.
    pub fn with_max_outstanding(mut self, limit: Option<usize>) -> Self {
        self.max_outstanding = limit;
        self
    }

    async fn entry(&self, id: TaskId) -> Result<Entry, SchedulerError> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SchedulerError::NotFound(id))
    }

    /// Run one transition under the record's lock.
    async fn update<T: Send>(
        &self,
        id: TaskId,
        f: impl FnOnce(&mut TaskRecord, DateTime<Utc>) -> Result<T, SchedulerError> + Send,
    ) -> Result<T, SchedulerError> {
        let entry = self.entry(id).await?;
        let mut record = entry.lock().await;
        f(&mut record, self.clock.now())
    }

    fn release_outstanding(&self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task: NewTask) -> Result<TaskId, SchedulerError> {
        let mut records = self.records.write().await;

        if let Some(limit) = self.max_outstanding
            && self.outstanding.load(Ordering::Acquire) >= limit
        {
            return Err(SchedulerError::CapacityExceeded { limit });
        }

        let id = loop {
            let candidate = self.ids.generate_task_id();
            if !records.contains_key(&candidate) {
                break candidate;
            }
            tracing::warn!(task_id = %candidate, "task id collision, drawing again");
        };

        let record = TaskRecord::new(id, task, self.clock.now());
        tracing::debug!(task_id = %id, operation_type = %record.operation_type, "task created");
        records.insert(id, Arc::new(Mutex::new(record)));
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        Ok(id)
    }

    async fn get(&self, id: TaskId) -> Result<TaskRecord, SchedulerError> {
        let entry = self.entry(id).await?;
        let record = entry.lock().await;
        Ok(record.clone())
    }

    async fn transition_to_running(&self, id: TaskId) -> Result<TaskRecord, SchedulerError> {
        self.update(id, |record, now| {
            record.start(now)?;
            Ok(record.clone())
        })
        .await
    }

    async fn complete(&self, id: TaskId, result: serde_json::Value) -> Result<(), SchedulerError> {
        self.update(id, |record, now| record.complete(result, now))
            .await?;
        self.release_outstanding();
        Ok(())
    }

    async fn fail(&self, id: TaskId, failure: TaskFailure) -> Result<(), SchedulerError> {
        self.update(id, |record, now| record.fail(failure, now))
            .await?;
        self.release_outstanding();
        Ok(())
    }

    async fn cancel_pending(&self, id: TaskId) -> Result<(), SchedulerError> {
        self.update(id, |record, now| record.cancel(now)).await?;
        self.release_outstanding();
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<TaskRecord, SchedulerError> {
        let mut records = self.records.write().await;
        let entry = records.get(&id).cloned().ok_or(SchedulerError::NotFound(id))?;
        let record = entry.lock().await;
        if !record.status.is_terminal() {
            return Err(SchedulerError::InvalidTransition {
                id,
                from: record.status,
                to: record.status,
            });
        }
        let snapshot = record.clone();
        drop(record);
        records.remove(&id);
        Ok(snapshot)
    }

    async fn discard_pending(&self, id: TaskId) -> Result<(), SchedulerError> {
        let mut records = self.records.write().await;
        let entry = records.get(&id).cloned().ok_or(SchedulerError::NotFound(id))?;
        let status = entry.lock().await.status;
        if status != TaskStatus::Pending {
            return Err(SchedulerError::InvalidTransition {
                id,
                from: status,
                to: status,
            });
        }
        records.remove(&id);
        self.release_outstanding();
        Ok(())
    }

    async fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        // 遷移中（ロック中）のものは終端ではないか、読まれている最中なので次回に回す
        records.retain(|_, entry| match entry.try_lock() {
            Ok(record) => !matches!(record.finished_at, Some(at) if at < cutoff),
            Err(_) => true,
        });
        before - records.len()
    }

    async fn counts(&self) -> StatusCounts {
        let records = self.records.read().await;
        let mut counts = StatusCounts::default();
        for entry in records.values() {
            counts.add(entry.lock().await.status);
        }
        counts
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}
