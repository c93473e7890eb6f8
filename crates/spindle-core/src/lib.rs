//! spindle-core
//!
//! In-process task execution and status tracking.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, operation_type, state, record, errors, envelope）
//! - **ports**: 抽象化レイヤー（TaskStore, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryTaskStore, WorkQueue）
//! - **typed**: 型付き Operation API（Operation, OperationHandler, OperationRegistry）
//! - **app**: 組み立てと実行（EngineBuilder, TaskScheduler, WorkerPool, ReaperLoop）
//! - **error**: システムエラー（SchedulerError）

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod typed;

pub use crate::app::{
    BuildError, CancelOutcome, EngineBuilder, EngineConfig, SubmitRequest, TaskScheduler,
};
pub use crate::domain::{TaskId, TaskRecord, TaskStatus};
pub use crate::error::SchedulerError;
