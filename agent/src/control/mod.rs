//! Control Surface (§4.7): axum router translating HTTP requests into
//! messages for the Coordinator and Executor.

pub mod log_buffer;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use warden_types::Hints;

use crate::api::Tool;
use crate::executor::{Command, ExecutorRequest};
use log_buffer::LogBuffer;

#[derive(Clone)]
pub struct ControlState {
    pub hints: Hints,
    pub reset_tx: mpsc::Sender<()>,
    pub executor_tx: mpsc::Sender<ExecutorRequest>,
    pub log_buffer: LogBuffer,
    pub shutdown: CancellationToken,
    pub tools: Arc<BTreeMap<String, Arc<dyn Tool>>>,
}

pub fn router(state: ControlState) -> Router {
    Router::new()
        .route("/info", post(info))
        .route("/log", post(log))
        .route("/reset", post(reset))
        .route("/control/{task}", post(control))
        .route("/control/{task}/{timeout}", post(control_with_timeout))
        .route("/exec", post(exec))
        .route("/terminate", post(terminate))
        .with_state(Arc::new(state))
}

async fn info(State(state): State<Arc<ControlState>>) -> Json<Value> {
    let snapshot = state.hints.snapshot();
    Json(json!({
        "application": snapshot.application,
        "dependencies": snapshot.dependencies,
        "ip": snapshot.ip,
        "metrics": snapshot.metrics,
        "node": snapshot.node,
        "port": snapshot.port,
        "ports": snapshot.ports,
        "process": snapshot.process.to_string(),
        "public": snapshot.public,
        "state": snapshot.state.to_string(),
        "status": snapshot.status,
        "task": snapshot.task,
    }))
}

async fn log(State(state): State<Arc<ControlState>>) -> Json<Value> {
    Json(json!(state.log_buffer.lines()))
}

async fn reset(State(state): State<Arc<ControlState>>) -> StatusCode {
    let _ = state.reset_tx.send(()).await;
    StatusCode::OK
}

fn parse_command(task: &str) -> Option<Command> {
    match task {
        "check" => Some(Command::Check),
        "on" => Some(Command::On),
        "off" => Some(Command::Off),
        "ok" => Some(Command::Ok),
        "kill" => Some(Command::Kill),
        "signal" => Some(Command::Signal),
        _ => None,
    }
}

async fn control(State(state): State<Arc<ControlState>>, Path(task): Path<String>, body: Json<Value>) -> Response {
    dispatch(state, task, None, body.0).await
}

async fn control_with_timeout(
    State(state): State<Arc<ControlState>>,
    Path((task, timeout)): Path<(String, u64)>,
    body: Json<Value>,
) -> Response {
    dispatch(state, task, Some(timeout), body.0).await
}

async fn dispatch(state: Arc<ControlState>, task: String, timeout_secs: Option<u64>, payload: Value) -> Response {
    let Some(command) = parse_command(&task) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": format!("unknown task {task}")}))).into_response();
    };
    let (reply, rx) = oneshot::channel();
    if state.executor_tx.send(ExecutorRequest { command, payload, reply }).await.is_err() {
        return (StatusCode::GONE, Json(json!({"error": "executor terminated"}))).into_response();
    }
    let timeout = Duration::from_secs(timeout_secs.unwrap_or(60));
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok((code, body))) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(body)).into_response()
        }
        Ok(Err(_)) => (StatusCode::GONE, Json(json!({"error": "executor terminated"}))).into_response(),
        Err(_) => (StatusCode::REQUEST_TIMEOUT, Json(json!({"error": "timed out"}))).into_response(),
    }
}

/// Loopback-only: the caller is trusted to be the agent's own process
/// group (no container port exposes this surface externally in practice).
async fn terminate(State(state): State<Arc<ControlState>>) -> StatusCode {
    state.shutdown.cancel();
    StatusCode::OK
}

/// Runs a registered [`Tool`] named by the first whitespace-delimited token
/// of `X-Shell`, in a fresh temporary directory; the remainder of the
/// header is passed as its argument string. A raw request body, if present,
/// is written into that directory first as `attachment`.
async fn exec(State(state): State<Arc<ControlState>>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(shell) = headers.get("X-Shell").and_then(|v| v.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "missing X-Shell header"}))).into_response();
    };
    let mut parts = shell.splitn(2, ' ');
    let tag = parts.next().unwrap_or_default();
    let args = parts.next().unwrap_or_default();

    let Some(tool) = state.tools.get(tag) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": format!("unknown tool {tag}")}))).into_response();
    };

    let workdir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": err.to_string()}))).into_response();
        }
    };
    if !body.is_empty()
        && let Err(err) = std::fs::write(workdir.path().join("attachment"), &body) {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": err.to_string()}))).into_response();
        }

    match tool.body(args, workdir.path()).await {
        Ok(stdout) => (StatusCode::OK, Json(json!({"code": 0, "stdout": stdout}))).into_response(),
        Err(err) => (StatusCode::OK, Json(json!({"code": 1, "stdout": err.to_string()}))).into_response(),
    }
}
