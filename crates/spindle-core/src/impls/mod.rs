//! Impls - ports の実装と、プールが使うキュー
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: プロセス内の正本
//! - **WorkQueue**: スケジューラ -> ワーカースロットの有界 FIFO

pub mod inmem_store;
pub mod work_queue;

pub use self::inmem_store::InMemoryTaskStore;
pub use self::work_queue::{Backpressure, WorkQueue};
