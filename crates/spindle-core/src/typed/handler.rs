//! Handler / WorkUnit - operation を実行する側の定義
//!
//! # 二層構造
//! - **表層**: `OperationHandler<T>` - 引数は型付き
//! - **内部**: `WorkUnit` - object-safe。`TypedHandler<T, H>` で型消去して格納する

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::operation::Operation;
use crate::domain::{TaskEnvelope, TaskFailure, TaskId};

/// Failure reported by a work unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkError {
    #[error("{0}")]
    Failed(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    /// The unit noticed its cancellation token and stopped early.
    #[error("cancelled")]
    Cancelled,
}

impl WorkError {
    pub fn failed(message: impl Into<String>) -> Self {
        WorkError::Failed(message.into())
    }
}

impl From<WorkError> for TaskFailure {
    fn from(err: WorkError) -> Self {
        match err {
            WorkError::Cancelled => TaskFailure::cancelled(),
            other => TaskFailure::execution(other.to_string()),
        }
    }
}

/// What a running unit gets: the task's data and a cancellation token.
///
/// The token fires on cancel, on deadline and on pool shutdown. Checking it
/// is cooperative; a unit that ignores it just runs to the end and its
/// result is dropped.
#[derive(Debug, Clone)]
pub struct WorkContext {
    envelope: TaskEnvelope,
    cancel: CancellationToken,
}

impl WorkContext {
    pub fn new(envelope: TaskEnvelope, cancel: CancellationToken) -> Self {
        Self { envelope, cancel }
    }

    pub fn envelope(&self) -> &TaskEnvelope {
        &self.envelope
    }

    pub fn task_id(&self) -> TaskId {
        self.envelope.task_id()
    }

    pub fn parameters(&self) -> &Value {
        self.envelope.parameters()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the task has been asked to stop.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Executes one operation with typed parameters.
#[async_trait]
pub trait OperationHandler<T: Operation>: Send + Sync {
    async fn handle(&self, params: T, ctx: &WorkContext) -> Result<Value, WorkError>;
}

/// Object-safe unit of work, looked up by operation type.
#[async_trait]
pub trait WorkUnit: Send + Sync {
    async fn run(&self, ctx: WorkContext) -> Result<Value, WorkError>;
}

/// Adapts an `OperationHandler<T>` into a `WorkUnit` by decoding parameters.
pub struct TypedHandler<T: Operation, H: OperationHandler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Operation, H: OperationHandler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Operation, H: OperationHandler<T>> WorkUnit for TypedHandler<T, H> {
    async fn run(&self, ctx: WorkContext) -> Result<Value, WorkError> {
        let params: T = serde_json::from_value(ctx.parameters().clone())
            .map_err(|e| WorkError::InvalidParameters(e.to_string()))?;
        self.handler.handle(params, &ctx).await
    }
}
