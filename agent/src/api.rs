use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use warden_types::{ClusterView, ProcessState};

/// What `configure` hands back to the Executor: the invocation line (shell
/// command or argv[0] depending on `shell`) and environment overrides
/// merged on top of the pod's own environment.
pub type ConfigureOutput = (String, BTreeMap<String, String>);

/// The user-extensible capability set a pod script implements, per §9's
/// "polymorphic capability set" design note. Only `configure` is
/// mandatory; every other callback has a no-op default supplied here.
/// Failures during `configure`/`initialize` are fatal to the pod (the
/// Executor replies 406 and self-enqueues `kill`); failures in every other
/// callback are recoverable and reported through `status`/`metrics`/the
/// HTTP response code instead.
#[async_trait]
pub trait LifeCycle: Send + Sync {
    /// Invoked once, the first time the pod is configured.
    async fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Invoked before configuration; an error here reschedules rather than
    /// configuring (the leader retries after the damper elapses).
    async fn can_configure(&self, _view: &ClusterView) -> anyhow::Result<()> {
        Ok(())
    }

    /// Mandatory: decides what the pod runs and how.
    async fn configure(&self, view: &ClusterView) -> anyhow::Result<ConfigureOutput>;

    /// Invoked on every pod once its own configuration round completes
    /// successfully. Errors are logged, never surfaced to the caller.
    async fn configured(&self, _view: &ClusterView) -> anyhow::Result<()> {
        Ok(())
    }

    /// Invoked on an operator `/control/signal` request; the returned
    /// value (if any) is relayed back to the caller as the response body.
    async fn signaled(&self, _payload: Value, _process: ProcessState) -> anyhow::Result<Option<Value>> {
        Ok(None)
    }

    /// Invoked at `check_every` cadence while a child is running. An error
    /// counts as a failed check; a successful `Some(..)` replaces the
    /// pod's published metrics.
    async fn sanity_check(&self, _pid: Option<u32>) -> anyhow::Result<Option<Map<String, Value>>> {
        Ok(None)
    }

    /// Tears the child down. Default sends `SIGTERM`; override for a more
    /// elaborate shutdown sequence (the Executor still enforces `grace`
    /// and escalates to `SIGKILL` itself unless `soft` is set).
    async fn tear_down(&self, pid: u32) {
        let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), nix::sys::signal::Signal::SIGTERM);
    }

    /// Invoked last, whenever the pod shuts down.
    async fn finalize(&self) {}
}

/// The clustering characteristics a pod opts into: presently only the
/// optional leader-side health probe. `depends_on`/`damper`/`full_shutdown`
/// etc. are plain configuration (`warden_types::ReactiveConfig`), not
/// polymorphic behavior, so they live outside this trait.
#[async_trait]
pub trait Model: Send + Sync {
    /// Invoked on the leader at `probe_every` cadence. The returned string
    /// becomes `status`; an error is reported as `"* {err}"`.
    async fn probe(&self, _view: &ClusterView) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// A [`Model`] with no probe: the default when a pod script has nothing to
/// report beyond the rollout protocol itself.
pub struct NoProbe;

#[async_trait]
impl Model for NoProbe {
    async fn probe(&self, _view: &ClusterView) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// A diagnostic tool reachable through `/exec` (§4.7), tagged so
/// `X-Shell: <tag> <args...>` can pick it out. Runs in a fresh temporary
/// directory per invocation.
#[async_trait]
pub trait Tool: Send + Sync {
    fn tag(&self) -> &str;
    async fn body(&self, args: &str, workdir: &std::path::Path) -> anyhow::Result<String>;
}
