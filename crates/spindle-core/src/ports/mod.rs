//! Ports - 抽象化レイヤー
//!
//! ストア・時刻・ID 生成を trait で切り出し、実装（`impls`）と
//! アプリケーション層（`app`）を分離する。

pub mod clock;
pub mod id_generator;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::TaskStore;
