//! Request handlers for the task API, health and readiness.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use tracing::error;

use spindle_core::app::SchedulerStats;
use spindle_core::{CancelOutcome, SchedulerError, SubmitRequest, TaskId, TaskRecord};

use crate::state::AppState;

// ── Errors ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Error returned by handlers, rendered as `{error, message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn task_not_found(raw: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", format!("task not found: {raw}"))
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        let status = match &err {
            SchedulerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
            SchedulerError::CapacityExceeded { .. }
            | SchedulerError::QueueFull { .. }
            | SchedulerError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            SchedulerError::InvalidTransition { .. } => {
                error!(error = %err, "state machine rejected a request-path transition");
                return Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal error",
                );
            }
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse().map_err(|_| ApiError::task_not_found(raw))
}

fn epoch_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

// ── Tasks ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub task_id: TaskId,
    pub status: &'static str,
    pub message: String,
    pub operation_type: String,
    pub data_source: String,
}

pub async fn process(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let Json(request) = payload?;
    let operation_type = request.operation_type.clone();
    let data_source = request.data_source.clone();

    let task_id = state.scheduler.submit(request).await?;
    Ok(Json(ProcessResponse {
        task_id,
        status: "processing",
        message: format!("Started {operation_type} processing"),
        operation_type,
        data_source,
    }))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    let id = parse_task_id(&raw)?;
    Ok(Json(state.scheduler.get_status(id).await?))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub task_id: TaskId,
    pub outcome: CancelOutcome,
}

pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let id = parse_task_id(&raw)?;
    match state.scheduler.cancel(id).await? {
        CancelOutcome::AlreadyFinished => Err(ApiError::new(
            StatusCode::CONFLICT,
            "already_finished",
            format!("task {id} has already finished"),
        )),
        outcome => Ok(Json(CancelResponse {
            task_id: id,
            outcome,
        })),
    }
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<SchedulerStats> {
    Json(state.scheduler.stats().await)
}

// ── Health & Readiness ────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: f64,
    pub version: &'static str,
}

/// Liveness. Does not touch the engine.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: epoch_seconds(),
        version: state.version,
    })
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub timestamp: f64,
}

pub async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let (status, label) = if state.scheduler.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };
    (
        status,
        Json(ReadyResponse {
            status: label,
            timestamp: epoch_seconds(),
        }),
    )
}
