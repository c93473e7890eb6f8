//! App - アプリケーション層
//!
//! ports と impls を組み合わせて、エンジンとして動かす。
//!
//! # 主要コンポーネント
//! - **EngineBuilder**: 組み立てと起動時検証
//! - **TaskScheduler**: 公開窓口（submit / status / cancel / shutdown）
//! - **WorkerPool**: 固定数スロットでの実行
//! - **ReaperLoop**: 終端レコードの保持期限管理

pub mod builder;
pub mod config;
pub mod reaper_loop;
pub mod scheduler;
pub mod status;
pub mod worker_pool;

pub use self::builder::{BuildError, EngineBuilder};
pub use self::config::{Backpressure, EngineConfig, RetentionConfig};
pub use self::reaper_loop::ReaperLoop;
pub use self::scheduler::{CancelOutcome, SubmitRequest, TaskScheduler};
pub use self::status::{PoolStats, SchedulerStats, ShutdownReport};
pub use self::worker_pool::{Job, WorkerPool};
