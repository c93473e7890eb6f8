//! EngineBuilder - ストア・プール・スケジューラの組み立て
//!
//! # Fail-fast 設計
//! - expect_operations() で必須の operation_type を宣言
//! - build() 時に「期待集合 ⊆ 登録済み集合」と設定値をチェック
//! - 不足があれば BuildError を返す（起動後に unknown operation で気付くより早い）

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::config::EngineConfig;
use super::reaper_loop::ReaperLoop;
use super::scheduler::TaskScheduler;
use super::worker_pool::WorkerPool;
use crate::impls::InMemoryTaskStore;
use crate::ports::{Clock, SystemClock, TaskStore, UlidGenerator};
use crate::typed::{Operation, OperationHandler, OperationRegistry, RegistryError, WorkUnit};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing operation types: {0:?}. These were expected but not registered.")]
    MissingOperations(Vec<String>),
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}

/// Wires a `TaskScheduler`.
///
/// # 使用例
/// ```ignore
/// let scheduler = EngineBuilder::new()
///     .config(config)
///     .register::<Resize, _>(ResizeHandler)?
///     .expect_operations(&["resize"])
///     .build()?;
/// ```
pub struct EngineBuilder {
    registry: OperationRegistry,
    expected: Option<Vec<String>>,
    config: EngineConfig,
    store: Option<Arc<dyn TaskStore>>,
    clock: Arc<dyn Clock>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            registry: OperationRegistry::new(),
            expected: None,
            config: EngineConfig::default(),
            store: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register<T: Operation, H: OperationHandler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn register_unit(
        mut self,
        operation_type: impl Into<String>,
        unit: Arc<dyn WorkUnit>,
    ) -> Result<Self, RegistryError> {
        self.registry.register_unit(operation_type, unit)?;
        Ok(self)
    }

    pub fn expect_operations(mut self, operation_types: &[&str]) -> Self {
        self.expected = Some(operation_types.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Use a caller-provided store. `max_outstanding` is then the store's business.
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Clock for the default store and the reaper.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate and start the engine. Spawns the slots, so it must run inside a tokio runtime.
    pub fn build(self) -> Result<TaskScheduler, BuildError> {
        self.config.validate().map_err(BuildError::InvalidConfig)?;

        if let Some(expected) = &self.expected {
            let missing: Vec<String> = expected
                .iter()
                .filter(|op| !self.registry.contains(op))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingOperations(missing));
            }
        }

        let clock = self.clock;
        let store = match self.store {
            Some(store) => store,
            None => {
                let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
                Arc::new(
                    InMemoryTaskStore::with_parts(Arc::clone(&clock), ids)
                        .with_max_outstanding(self.config.max_outstanding),
                )
            }
        };

        let pool = WorkerPool::start(&self.config, Arc::clone(&store));

        let reaper_stop = CancellationToken::new();
        let reaper = self.config.retention.map(|retention| {
            ReaperLoop::new(Arc::clone(&store), clock, retention).spawn(reaper_stop.clone())
        });

        Ok(TaskScheduler::new(
            store,
            pool,
            Arc::new(self.registry),
            self.config,
            reaper_stop,
            reaper,
        ))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
