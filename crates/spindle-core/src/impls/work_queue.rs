//! WorkQueue - スケジューラとワーカースロットの間の有界 FIFO
//!
//! # 実装詳細
//! - `Mutex<VecDeque<T>>` + `Notify` 2 本（not_empty / not_full）
//! - 待つ側は状態を見る前に `Notified::enable()` で登録しておく（close の取りこぼし防止）
//! - ロックを握ったまま await しない
//! - close 後も残っている要素は pop で取り出せる（drain 用）。空になったら None

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::SchedulerError;

/// What `push` does when the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backpressure {
    /// Fail with `QueueFull` right away.
    #[default]
    Reject,
    /// Wait up to the given time for space, then fail with `QueueFull`.
    BlockWithTimeout(Duration),
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        // 中で panic する処理はないので、poison されても中身は壊れていない
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append at the back, applying `policy` when full.
    pub async fn push(&self, item: T, policy: Backpressure) -> Result<(), SchedulerError> {
        let deadline = match policy {
            Backpressure::Reject => None,
            Backpressure::BlockWithTimeout(timeout) => Some(Instant::now() + timeout),
        };

        loop {
            let mut notified = pin!(self.not_full.notified());
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(SchedulerError::ShuttingDown);
                }
                if state.items.len() < self.capacity {
                    state.items.push_back(item);
                    drop(state);
                    self.not_empty.notify_one();
                    return Ok(());
                }
            }

            let full = SchedulerError::QueueFull {
                capacity: self.capacity,
            };
            let Some(deadline) = deadline else {
                return Err(full);
            };
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(full);
            }
        }
    }

    /// Take the oldest item, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let mut notified = pin!(self.not_empty.notified());
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    drop(state);
                    self.not_full.notify_one();
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Remove the first queued item matching `pred`.
    pub fn remove_first(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        let removed = {
            let mut state = self.lock();
            let pos = state.items.iter().position(pred)?;
            state.items.remove(pos)
        };
        self.not_full.notify_one();
        removed
    }

    /// Stop accepting pushes and wake every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn pops_in_fifo_order() {
        let queue = WorkQueue::new(8);
        for i in 0..5 {
            queue.push(i, Backpressure::Reject).await.unwrap();
        }
        for i in 0..5 {
            assert_eq!(queue.pop().await, Some(i));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn reject_policy_fails_fast_when_full() {
        let queue = WorkQueue::new(1);
        queue.push(1, Backpressure::Reject).await.unwrap();
        let err = queue.push(2, Backpressure::Reject).await.unwrap_err();
        assert_eq!(err, SchedulerError::QueueFull { capacity: 1 });
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn block_policy_times_out() {
        let queue = WorkQueue::new(1);
        queue.push(1, Backpressure::Reject).await.unwrap();

        let start = Instant::now();
        let err = queue
            .push(2, Backpressure::BlockWithTimeout(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(matches!(err, SchedulerError::QueueFull { .. }));
    }

    #[tokio::test]
    async fn block_policy_succeeds_once_space_frees() {
        let queue = Arc::new(WorkQueue::new(1));
        queue.push(1, Backpressure::Reject).await.unwrap();

        let pusher = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move {
                queue
                    .push(2, Backpressure::BlockWithTimeout(Duration::from_secs(5)))
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.pop().await, Some(1));
        pusher.await.unwrap().unwrap();
        assert_eq!(queue.pop().await, Some(2));
    }

    #[tokio::test]
    async fn push_wakes_waiting_pop() {
        let queue = Arc::new(WorkQueue::new(4));
        let popper = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.pop().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.push(7, Backpressure::Reject).await.unwrap();
        assert_eq!(popper.await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let queue = Arc::new(WorkQueue::new(4));
        queue.push(1, Backpressure::Reject).await.unwrap();
        queue.close();

        assert_eq!(
            queue.push(2, Backpressure::Reject).await,
            Err(SchedulerError::ShuttingDown)
        );
        assert_eq!(queue.pop().await, Some(1));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn close_wakes_idle_poppers() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new(4));
        let poppers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.pop().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.close();
        for popper in poppers {
            assert_eq!(popper.await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn remove_first_takes_item_out() {
        let queue = WorkQueue::new(4);
        for i in [10, 20, 30] {
            queue.push(i, Backpressure::Reject).await.unwrap();
        }
        assert_eq!(queue.remove_first(|&i| i == 20), Some(20));
        assert_eq!(queue.remove_first(|&i| i == 99), None);
        assert_eq!(queue.pop().await, Some(10));
        assert_eq!(queue.pop().await, Some(30));
    }
}
