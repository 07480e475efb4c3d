//! The pod coordination agent: a [`Coordinator`](coordinator::Coordinator)
//! owning the ZooKeeper session and leader election, a leader-only
//! [`ClusteringModel`](model::ClusteringModel) fed by the Local/Remote
//! Watchers, a [`Executor`](executor::Executor) supervising the child
//! process, and an axum-based HTTP control surface tying them together.
//! Pod scripts depend on this crate and supply their behavior through the
//! [`api::LifeCycle`]/[`api::Model`]/[`api::Tool`] traits; the `agentd`
//! binary wires up a minimal default for standalone use.

pub mod api;
pub mod args;
pub mod boot;
pub mod control;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod logging;
pub mod model;
pub mod paths;
pub mod watchers;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use warden_types::{Hints, PipedConfig, ReactiveConfig};

use api::{LifeCycle, Model, Tool};
use args::Args;
use control::log_buffer::LogBuffer;
use control::{ControlState, router};
use coordinator::Coordinator;
use executor::{Executor, ExecutorRequest};

const SESSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Boots the agent: logging, the Coordinator (which owns the Watchers and
/// the Clustering Model once it wins the lock), the Lifecycle Executor, and
/// the control-surface HTTP server, until `shutdown_signal()` (or a
/// `/terminate` request) fires.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    args: Args,
    reactive: ReactiveConfig,
    piped: PipedConfig,
    lifecycle: Arc<dyn LifeCycle>,
    probe: Arc<dyn Model>,
    tools: Vec<Arc<dyn Tool>>,
) -> anyhow::Result<()> {
    let uuid = uuid::Uuid::new_v4().to_string();

    let log_buffer = LogBuffer::new();
    logging::init(args.ochopod_debug, log_buffer.clone());

    unsafe {
        std::env::set_var("POD_UUID", &uuid);
    }
    warden_common::metrics::maybe_spawn_metrics_server();

    let breadcrumbs = boot::discover(&args, &uuid);
    let hints = Hints::new(breadcrumbs);

    let shutdown = CancellationToken::new();
    let (reset_tx, reset_rx) = mpsc::channel(1);
    let (executor_tx, executor_rx) = mpsc::channel::<ExecutorRequest>(64);
    let (terminate_tx, mut terminate_rx) = mpsc::channel(1);

    let coordinator = Coordinator::new(
        uuid.clone(),
        args.ochopod_zk.clone(),
        SESSION_TIMEOUT,
        hints.breadcrumbs(),
        hints.clone(),
        reactive,
        probe,
        reset_rx,
    );
    let coordinator_handle = tokio::spawn(coordinator.run());

    let executor = Executor::new(hints.clone(), lifecycle, piped, args.ochopod_start, executor_rx, shutdown.clone(), terminate_tx);
    let executor_handle = tokio::spawn(executor.run());

    let tools: BTreeMap<String, Arc<dyn Tool>> = tools.into_iter().map(|tool| (tool.tag().to_string(), tool)).collect();
    let state = ControlState { hints, reset_tx, executor_tx, log_buffer, shutdown: shutdown.clone(), tools: Arc::new(tools) };
    let app = router(state);

    let addr = format!("0.0.0.0:{}", args.ochopod_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "{}", "control surface listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown(shutdown.clone()));

    tokio::select! {
        result = server => {
            result?;
        }
        _ = terminate_rx.recv() => {
            shutdown.cancel();
        }
    }

    coordinator_handle.abort();
    let _ = executor_handle.await;
    Ok(())
}

async fn wait_for_shutdown(shutdown: CancellationToken) {
    tokio::select! {
        _ = warden_common::shutdown::shutdown_signal() => shutdown.cancel(),
        _ = shutdown.cancelled() => {}
    }
}
