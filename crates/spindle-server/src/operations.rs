//! Built-in operations the server registers at startup.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use spindle_core::EngineBuilder;
use spindle_core::typed::{Operation, OperationHandler, RegistryError, WorkContext, WorkError};

/// Operation types every server instance must provide.
pub const BUILTIN: &[&str] = &[Echo::TYPE, Sleep::TYPE];

/// Returns its parameters unchanged.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct Echo(pub Value);

impl Operation for Echo {
    const TYPE: &'static str = "echo";
}

pub struct EchoHandler;

#[async_trait]
impl OperationHandler<Echo> for EchoHandler {
    async fn handle(&self, params: Echo, _ctx: &WorkContext) -> Result<Value, WorkError> {
        Ok(params.0)
    }
}

/// Waits `ms` milliseconds. Stops early when cancelled.
#[derive(Debug, Deserialize)]
pub struct Sleep {
    #[serde(default)]
    pub ms: u64,
}

impl Operation for Sleep {
    const TYPE: &'static str = "sleep";
}

pub struct SleepHandler;

#[async_trait]
impl OperationHandler<Sleep> for SleepHandler {
    async fn handle(&self, params: Sleep, ctx: &WorkContext) -> Result<Value, WorkError> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(params.ms)) => {
                Ok(json!({ "slept_ms": params.ms }))
            }
            _ = ctx.cancelled() => Err(WorkError::Cancelled),
        }
    }
}

/// Register every built-in operation.
pub fn register_builtin(builder: EngineBuilder) -> Result<EngineBuilder, RegistryError> {
    builder
        .register::<Echo, _>(EchoHandler)?
        .register::<Sleep, _>(SleepHandler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_core::domain::{OperationType, TaskEnvelope, TaskId};
    use spindle_core::typed::{TypedHandler, WorkUnit};
    use tokio_util::sync::CancellationToken;

    fn ctx(op: &str, parameters: Value, cancel: CancellationToken) -> WorkContext {
        let envelope = TaskEnvelope::new(
            "task-01ARZ3NDEKTSV4RRFFQ69G5FAV".parse::<TaskId>().unwrap(),
            OperationType::new(op).unwrap(),
            "test",
            parameters,
        );
        WorkContext::new(envelope, cancel)
    }

    #[tokio::test]
    async fn echo_returns_any_json() {
        let unit = TypedHandler::<Echo, _>::new(EchoHandler);
        for value in [json!({"n": 3}), json!([1, 2]), json!("text"), Value::Null] {
            let out = unit
                .run(ctx("echo", value.clone(), CancellationToken::new()))
                .await
                .unwrap();
            assert_eq!(out, value);
        }
    }

    #[tokio::test]
    async fn sleep_reports_duration() {
        let unit = TypedHandler::<Sleep, _>::new(SleepHandler);
        let out = unit
            .run(ctx("sleep", json!({"ms": 5}), CancellationToken::new()))
            .await
            .unwrap();
        assert_eq!(out, json!({"slept_ms": 5}));
    }

    #[tokio::test]
    async fn sleep_stops_when_cancelled() {
        let unit = TypedHandler::<Sleep, _>::new(SleepHandler);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = unit
            .run(ctx("sleep", json!({"ms": 60_000}), cancel))
            .await
            .unwrap_err();
        assert_eq!(err, WorkError::Cancelled);
    }

    #[tokio::test]
    async fn sleep_rejects_bad_parameters() {
        let unit = TypedHandler::<Sleep, _>::new(SleepHandler);
        let err = unit
            .run(ctx("sleep", json!({"ms": "long"}), CancellationToken::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkError::InvalidParameters(_)));
    }
}
