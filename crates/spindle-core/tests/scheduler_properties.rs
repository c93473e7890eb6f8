//! End-to-end behaviour of the engine through its public API.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::{Value, json};

use spindle_core::domain::FailureKind;
use spindle_core::typed::{Operation, OperationHandler, WorkContext, WorkError, WorkUnit};
use spindle_core::{
    EngineBuilder, EngineConfig, SchedulerError, SubmitRequest, TaskId, TaskRecord,
    TaskScheduler, TaskStatus,
};

struct Echo;

#[async_trait]
impl WorkUnit for Echo {
    async fn run(&self, ctx: WorkContext) -> Result<Value, WorkError> {
        Ok(ctx.parameters().clone())
    }
}

#[derive(Deserialize)]
struct Fail {
    reason: String,
}

impl Operation for Fail {
    const TYPE: &'static str = "fail";
}

struct FailHandler;

#[async_trait]
impl OperationHandler<Fail> for FailHandler {
    async fn handle(&self, params: Fail, _ctx: &WorkContext) -> Result<Value, WorkError> {
        Err(WorkError::Failed(params.reason))
    }
}

/// Counts executions and the peak number running at once.
#[derive(Default)]
struct Probe {
    runs: AtomicUsize,
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl WorkUnit for Probe {
    async fn run(&self, _ctx: WorkContext) -> Result<Value, WorkError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

struct Hold;

#[async_trait]
impl WorkUnit for Hold {
    async fn run(&self, ctx: WorkContext) -> Result<Value, WorkError> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(10)) => Ok(Value::Null),
            _ = ctx.cancelled() => Err(WorkError::Cancelled),
        }
    }
}

fn engine(config: EngineConfig, probe: Arc<Probe>) -> TaskScheduler {
    EngineBuilder::new()
        .config(config)
        .register_unit("echo", Arc::new(Echo))
        .unwrap()
        .register::<Fail, _>(FailHandler)
        .unwrap()
        .register_unit("probe", probe)
        .unwrap()
        .register_unit("hold", Arc::new(Hold))
        .unwrap()
        .expect_operations(&["echo", "fail", "probe", "hold"])
        .build()
        .unwrap()
}

async fn poll_until_terminal(s: &TaskScheduler, id: TaskId) -> (Vec<TaskStatus>, TaskRecord) {
    let mut seen = Vec::new();
    for _ in 0..1_000 {
        let record = s.get_status(id).await.unwrap();
        seen.push(record.status);
        if record.status.is_terminal() {
            return (seen, record);
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("task {id} did not finish");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn polled_status_never_regresses() {
    let s = engine(EngineConfig::default(), Arc::default());
    let ids: Vec<TaskId> = {
        let mut ids = Vec::new();
        for i in 0..20 {
            ids.push(s.submit(SubmitRequest::new("probe", json!(i))).await.unwrap());
        }
        ids
    };

    for id in ids {
        let (seen, _) = poll_until_terminal(&s, id).await;
        assert!(
            seen.windows(2).all(|w| w[0].rank() <= w[1].rank()),
            "status regressed: {seen:?}"
        );
    }
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let s = engine(EngineConfig::default(), Arc::default());
    s.submit(SubmitRequest::new("echo", json!({}))).await.unwrap();

    let stranger: TaskId = "task-01ARZ3NDEKTSV4RRFFQ69G5FAV".parse().unwrap();
    assert_eq!(
        s.get_status(stranger).await,
        Err(SchedulerError::NotFound(stranger))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_get_distinct_ids() {
    let s = Arc::new(engine(EngineConfig::default(), Arc::default()));

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.submit(SubmitRequest::new("echo", json!(i))).await })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap().unwrap());
    }
    assert_eq!(ids.len(), 200);
}

#[tokio::test]
async fn result_and_error_are_mutually_exclusive() {
    let s = engine(EngineConfig::default(), Arc::default());

    let ok = s.submit(SubmitRequest::new("echo", json!("hi"))).await.unwrap();
    let bad = s
        .submit(SubmitRequest::new("fail", json!({"reason": "no input"})))
        .await
        .unwrap();

    let (_, ok) = poll_until_terminal(&s, ok).await;
    assert_eq!(ok.status, TaskStatus::Completed);
    assert_eq!(ok.result, Some(json!("hi")));
    assert!(ok.error.is_none());

    let (_, bad) = poll_until_terminal(&s, bad).await;
    assert_eq!(bad.status, TaskStatus::Failed);
    assert!(bad.result.is_none());
    let error = bad.error.unwrap();
    assert_eq!(error.kind, FailureKind::Execution);
    assert_eq!(error.message, "no input");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_slot_runs_one_at_a_time() {
    let probe = Arc::new(Probe::default());
    let s = engine(
        EngineConfig {
            concurrency: 1,
            ..EngineConfig::default()
        },
        Arc::clone(&probe),
    );

    let mut ids = Vec::new();
    for _ in 0..15 {
        ids.push(s.submit(SubmitRequest::new("probe", Value::Null)).await.unwrap());
    }
    for id in ids {
        poll_until_terminal(&s, id).await;
    }

    assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
    assert_eq!(probe.runs.load(Ordering::SeqCst), 15);
}

#[tokio::test]
async fn empty_operation_type_changes_nothing() {
    let s = engine(EngineConfig::default(), Arc::default());
    let before = s.stats().await.tasks.total();

    let err = s.submit(SubmitRequest::new("", json!({}))).await.unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidRequest(_)));
    assert_eq!(s.stats().await.tasks.total(), before);
}

#[tokio::test]
async fn echo_returns_its_parameters() {
    let s = engine(EngineConfig::default(), Arc::default());
    let id = s.submit(SubmitRequest::new("echo", json!({"n": 3}))).await.unwrap();

    let (_, record) = poll_until_terminal(&s, id).await;
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.result, Some(json!({"n": 3})));
}

#[tokio::test]
async fn cancelled_pending_task_never_executes() {
    let probe = Arc::new(Probe::default());
    let s = engine(
        EngineConfig {
            concurrency: 1,
            ..EngineConfig::default()
        },
        Arc::clone(&probe),
    );

    let blocker = s.submit(SubmitRequest::new("hold", json!({}))).await.unwrap();
    while s.get_status(blocker).await.unwrap().status != TaskStatus::Running {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let victim = s.submit(SubmitRequest::new("probe", Value::Null)).await.unwrap();
    s.cancel(victim).await.unwrap();
    s.cancel(blocker).await.unwrap();

    let (_, record) = poll_until_terminal(&s, victim).await;
    assert_eq!(record.error.map(|e| e.kind), Some(FailureKind::Cancelled));
    poll_until_terminal(&s, blocker).await;

    s.shutdown().await;
    assert_eq!(probe.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn per_task_deadline_marks_timeout() {
    let s = engine(EngineConfig::default(), Arc::default());
    let id = s
        .submit(SubmitRequest::new("hold", json!({})).with_timeout(Duration::from_millis(30)))
        .await
        .unwrap();

    let (_, record) = poll_until_terminal(&s, id).await;
    assert_eq!(record.status, TaskStatus::Failed);
    assert_eq!(record.error.map(|e| e.kind), Some(FailureKind::Timeout));
    assert_eq!(record.timeout_ms, Some(30));
}
