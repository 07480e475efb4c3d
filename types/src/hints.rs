use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::breadcrumbs::Breadcrumbs;

/// `state` field of [`Hints`]. Owned exclusively by the Coordinator and the
/// Clustering Model (never both at once: a pod is `Follower` until it wins
/// the lock, at which point only the Model mutates it).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PodState {
    #[serde(rename = "follower")]
    Follower,
    #[serde(rename = "leader")]
    Leader,
    #[serde(rename = "leader (configuring)")]
    LeaderConfiguring,
    #[serde(rename = "leader (configuration pending)")]
    LeaderConfigurationPending,
}

impl std::fmt::Display for PodState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PodState::Follower => "follower",
            PodState::Leader => "leader",
            PodState::LeaderConfiguring => "leader (configuring)",
            PodState::LeaderConfigurationPending => "leader (configuration pending)",
        };
        f.write_str(s)
    }
}

/// `process` field of [`Hints`]. Owned exclusively by the Lifecycle Executor.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcessState {
    #[serde(rename = "stopped")]
    Stopped,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "terminating")]
    Terminating,
    #[serde(rename = "dead")]
    Dead,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessState::Stopped => "stopped",
            ProcessState::Running => "running",
            ProcessState::Terminating => "terminating",
            ProcessState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// A fully materialized, serializable view of a pod's runtime record, as
/// returned by the `/info` control endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HintsSnapshot {
    pub cluster: String,
    pub namespace: String,
    pub port: u16,
    pub ip: String,
    pub public: String,
    pub ports: std::collections::BTreeMap<String, u16>,
    pub node: String,
    pub task: String,
    pub application: String,
    pub seq: u32,
    pub state: PodState,
    pub process: ProcessState,
    pub status: String,
    pub metrics: serde_json::Map<String, Value>,
    pub dependencies: std::collections::BTreeMap<String, std::collections::BTreeMap<String, Breadcrumbs>>,
}

struct Inner {
    breadcrumbs: Breadcrumbs,
    state: PodState,
    process: ProcessState,
    status: String,
    metrics: serde_json::Map<String, Value>,
    dependencies: std::collections::BTreeMap<String, std::collections::BTreeMap<String, Breadcrumbs>>,
}

/// The mutable, shared-ownership runtime record for one pod. Cloning a
/// `Hints` clones the handle, not the data: every clone observes the same
/// underlying state. Per (I1)/(I4)/§5 field ownership is partitioned so no
/// two writers ever touch the same field: the Coordinator writes `seq`
/// (once) and `state` while a follower, the Model writes
/// `state`/`status`/`dependencies` while leading, the Executor writes
/// `process`/`metrics`.
#[derive(Clone)]
pub struct Hints {
    inner: Arc<Mutex<Inner>>,
}

impl Hints {
    pub fn new(breadcrumbs: Breadcrumbs) -> Self {
        Hints {
            inner: Arc::new(Mutex::new(Inner {
                breadcrumbs,
                state: PodState::Follower,
                process: ProcessState::Stopped,
                status: String::new(),
                metrics: serde_json::Map::new(),
                dependencies: std::collections::BTreeMap::new(),
            })),
        }
    }

    pub fn breadcrumbs(&self) -> Breadcrumbs {
        self.inner.lock().unwrap().breadcrumbs.clone()
    }

    /// `seq` is assigned exactly once, the first time the Coordinator's
    /// registration succeeds (I1); subsequent reconnects must never call
    /// this again.
    pub fn set_seq(&self, seq: u32) {
        self.inner.lock().unwrap().breadcrumbs.seq = seq;
    }

    pub fn seq(&self) -> u32 {
        self.inner.lock().unwrap().breadcrumbs.seq
    }

    pub fn set_state(&self, state: PodState) {
        self.inner.lock().unwrap().state = state;
    }

    pub fn state(&self) -> PodState {
        self.inner.lock().unwrap().state
    }

    pub fn set_process(&self, process: ProcessState) {
        self.inner.lock().unwrap().process = process;
    }

    pub fn process(&self) -> ProcessState {
        self.inner.lock().unwrap().process
    }

    pub fn set_status(&self, status: impl Into<String>) {
        self.inner.lock().unwrap().status = status.into();
    }

    pub fn status(&self) -> String {
        self.inner.lock().unwrap().status.clone()
    }

    pub fn set_metrics(&self, metrics: serde_json::Map<String, Value>) {
        self.inner.lock().unwrap().metrics = metrics;
    }

    /// Set by the Model after every aggregation tick (`refresh_last`) to the
    /// current dependency snapshots, for `/info`'s `dependencies` field.
    pub fn set_dependencies(&self, dependencies: std::collections::BTreeMap<String, std::collections::BTreeMap<String, Breadcrumbs>>) {
        self.inner.lock().unwrap().dependencies = dependencies;
    }

    pub fn snapshot(&self) -> HintsSnapshot {
        let guard = self.inner.lock().unwrap();
        HintsSnapshot {
            cluster: guard.breadcrumbs.cluster.clone(),
            namespace: guard.breadcrumbs.namespace.clone(),
            port: guard.breadcrumbs.port,
            ip: guard.breadcrumbs.ip.clone(),
            public: guard.breadcrumbs.public.clone(),
            ports: guard.breadcrumbs.ports.clone(),
            node: guard.breadcrumbs.node.clone(),
            task: guard.breadcrumbs.task.clone(),
            application: guard.breadcrumbs.application.clone(),
            seq: guard.breadcrumbs.seq,
            state: guard.state,
            process: guard.process,
            status: guard.status.clone(),
            metrics: guard.metrics.clone(),
            dependencies: guard.dependencies.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn breadcrumbs() -> Breadcrumbs {
        Breadcrumbs {
            cluster: "web".into(),
            namespace: "marathon".into(),
            port: 8080,
            ip: "10.0.0.1".into(),
            public: "54.0.0.1".into(),
            ports: BTreeMap::new(),
            node: "node-1".into(),
            task: "task-1".into(),
            application: "app-1".into(),
            seq: 0,
        }
    }

    #[test]
    fn seq_assigned_once_survives_clones() {
        let hints = Hints::new(breadcrumbs());
        let clone = hints.clone();
        hints.set_seq(7);
        assert_eq!(clone.seq(), 7);
    }

    #[test]
    fn state_and_process_are_independent_fields() {
        let hints = Hints::new(breadcrumbs());
        hints.set_state(PodState::Leader);
        hints.set_process(ProcessState::Running);
        assert_eq!(hints.state(), PodState::Leader);
        assert_eq!(hints.process(), ProcessState::Running);
    }

    #[test]
    fn dependencies_land_in_snapshot() {
        let hints = Hints::new(breadcrumbs());
        let deps = BTreeMap::from([("zookeeper".to_string(), BTreeMap::from([("u1".to_string(), breadcrumbs())]))]);
        hints.set_dependencies(deps.clone());
        assert_eq!(hints.snapshot().dependencies, deps);
    }

    #[test]
    fn state_serializes_to_spec_strings() {
        assert_eq!(
            serde_json::to_string(&PodState::LeaderConfigurationPending).unwrap(),
            "\"leader (configuration pending)\""
        );
    }
}
