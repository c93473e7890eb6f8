//! Typed - 型付き Operation API
//!
//! operation_type の文字列と引数の型を `Operation` で結び付け、
//! 実行側は `WorkUnit` に型消去してレジストリに格納する。
//!
//! # 二層構造
//! - **表層（Typed）**: `Operation`, `OperationHandler<T>`
//! - **内部（Dyn）**: `WorkUnit`

pub mod handler;
pub mod operation;
pub mod registry;

pub use self::handler::{OperationHandler, TypedHandler, WorkContext, WorkError, WorkUnit};
pub use self::operation::Operation;
pub use self::registry::{OperationRegistry, RegistryError};
