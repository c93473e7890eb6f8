//! ReaperLoop - 終端レコードの保持期限切れを回収
//!
//! # フロー
//! 1. interval ごとに起きる
//! 2. cutoff = now - max_age を計算
//! 3. TaskStore::purge_finished_before(cutoff) で削除
//!
//! Pending / Running には触らない。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::RetentionConfig;
use crate::ports::{Clock, TaskStore};

pub struct ReaperLoop {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    max_age: Duration,
    interval: Duration,
}

impl ReaperLoop {
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            store,
            clock,
            max_age: retention.max_age,
            interval: retention.interval,
        }
    }

    /// One purge pass. Returns the number of records removed.
    pub async fn reap_once(&self) -> usize {
        let max_age = match chrono::Duration::from_std(self.max_age) {
            Ok(max_age) => max_age,
            Err(_) => {
                warn!(
                    max_age_secs = self.max_age.as_secs(),
                    "retention age out of range; skipping purge"
                );
                return 0;
            }
        };
        let Some(cutoff) = self.clock.now().checked_sub_signed(max_age) else {
            warn!(
                max_age_secs = self.max_age.as_secs(),
                "retention cutoff precedes the representable range; skipping purge"
            );
            return 0;
        };
        let purged = self.store.purge_finished_before(cutoff).await;
        if purged > 0 {
            info!(purged, %cutoff, "purged expired task records");
        } else {
            debug!(%cutoff, "nothing to purge");
        }
        purged
    }

    /// Run until `stop` fires.
    pub fn spawn(self, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 最初の tick は即時に来るので読み捨てる
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        self.reap_once().await;
                    }
                }
            }
            debug!("reaper stopped");
        })
    }
}
