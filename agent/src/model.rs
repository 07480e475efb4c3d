use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use warden_common::colors::ROLLOUT;
use warden_types::hash::{Snapshots, content_hash};
use warden_types::{Breadcrumbs, ClusterView, Hints, PodState, ReactiveConfig};
use warden_zk::Csc;

use crate::api::Model;
use crate::paths;

/// What the Local/Remote Watchers feed the Model.
#[derive(Debug)]
pub enum ModelEvent {
    SnapshotUpdate { key: String, pods: BTreeMap<String, Breadcrumbs> },
    WatcherFailure,
}

/// Why the Model's main loop stopped; the Coordinator uses this to decide
/// whether to reset immediately (a watcher died) or simply release the
/// lock (it was asked to terminate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelExit {
    Cancelled,
    WatcherFailure,
}

enum Verdict {
    Continue,
    Abort,
}

/// Only runs on the leader (I2): aggregates local + dependency snapshots,
/// damps changes, and drives the rollout protocol.
pub struct ClusteringModel {
    cluster: String,
    self_uuid: String,
    csc: Arc<Csc>,
    hints: Hints,
    config: ReactiveConfig,
    probe_cb: Arc<dyn Model>,
    http: reqwest::Client,
    rx: mpsc::Receiver<ModelEvent>,
    cancel: CancellationToken,
    snapshots: Snapshots,
    dirty: bool,
    last: Option<ClusterView>,
    next_probe: Instant,
    next: Option<Instant>,
    hash_path: String,
    snapshot_path: String,
}

impl ClusteringModel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        namespace: String,
        cluster: String,
        self_uuid: String,
        csc: Arc<Csc>,
        hints: Hints,
        config: ReactiveConfig,
        probe_cb: Arc<dyn Model>,
        rx: mpsc::Receiver<ModelEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let mut snapshots: Snapshots = BTreeMap::new();
        snapshots.insert("local".to_string(), BTreeMap::new());
        for dep in &config.depends_on {
            snapshots.insert(dep.clone(), BTreeMap::new());
        }
        let hash_path = paths::hash(&namespace, &cluster);
        let snapshot_path = paths::snapshot(&namespace, &cluster);
        ClusteringModel {
            cluster,
            self_uuid,
            csc,
            hints,
            config,
            probe_cb,
            http: reqwest::Client::new(),
            rx,
            cancel,
            snapshots,
            dirty: false,
            last: None,
            next_probe: Instant::now(),
            next: None,
            hash_path,
            snapshot_path,
        }
    }

    pub async fn run(mut self) -> ModelExit {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut pending = true;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return ModelExit::Cancelled,
                _ = ticker.tick() => {
                    loop {
                        match self.rx.try_recv() {
                            Ok(ModelEvent::SnapshotUpdate { key, pods }) => {
                                self.snapshots.insert(key, pods);
                                pending = true;
                            }
                            Ok(ModelEvent::WatcherFailure) => return ModelExit::WatcherFailure,
                            Err(mpsc::error::TryRecvError::Empty) => break,
                            Err(mpsc::error::TryRecvError::Disconnected) => return ModelExit::WatcherFailure,
                        }
                    }
                    if self.tick(&mut pending).await.is_err() {
                        return ModelExit::WatcherFailure;
                    }
                }
            }
        }
    }

    async fn tick(&mut self, pending: &mut bool) -> Result<(), warden_zk::CscError> {
        if *pending {
            *pending = false;
            let (data, _version) = self.csc.get(&self.hash_path).await?;
            let stored = String::from_utf8_lossy(&data).to_string();
            let current = content_hash(&self.snapshots);
            if current != stored {
                if !self.dirty {
                    self.dirty = true;
                    self.next = Some(Instant::now() + self.config.damper);
                    self.hints.set_status(format!("* reconfiguring in {:.1}s", self.config.damper.as_secs_f64()));
                    self.hints.set_state(PodState::LeaderConfigurationPending);
                    info!(cluster = %self.cluster, "{}", "cluster topology changed, damper started".color(ROLLOUT));
                }
            } else if self.dirty {
                self.dirty = false;
                self.hints.set_status(String::new());
                self.hints.set_state(PodState::Leader);
                info!(cluster = %self.cluster, "{}", "topology reverted within damper window, cancelling".color(ROLLOUT));
            } else {
                let local = self.snapshots.get("local").cloned().unwrap_or_default();
                self.csc.set(&self.snapshot_path, &serde_json::to_vec(&local).unwrap_or_default()).await?;
                self.refresh_last(local);
            }
        }

        if !self.dirty && Instant::now() >= self.next_probe {
            self.run_probe().await;
        }

        if self.dirty
            && let Some(next) = self.next
                && Instant::now() >= next {
                    self.rollout().await?;
                }
        Ok(())
    }

    fn refresh_last(&mut self, local: BTreeMap<String, Breadcrumbs>) {
        let dependencies = self.dependencies_snapshot();
        self.hints.set_dependencies(dependencies.clone());
        self.last = ClusterView::for_pod(&self.self_uuid, local, dependencies);
    }

    fn dependencies_snapshot(&self) -> BTreeMap<String, BTreeMap<String, Breadcrumbs>> {
        self.snapshots
            .iter()
            .filter(|(key, _)| key.as_str() != "local")
            .map(|(key, pods)| (key.clone(), pods.clone()))
            .collect()
    }

    async fn run_probe(&mut self) {
        if let Some(view) = self.last.clone() {
            match self.probe_cb.probe(&view).await {
                Ok(Some(status)) => self.hints.set_status(status),
                Ok(None) => {}
                Err(err) => self.hints.set_status(format!("* {err}")),
            }
        }
        self.next_probe = Instant::now() + self.config.probe_every;
    }

    fn reschedule(&mut self) {
        self.next = Some(Instant::now() + self.config.damper);
        self.hints.set_state(PodState::LeaderConfigurationPending);
        warn!(cluster = %self.cluster, "{}", "rollout aborted, rescheduled after damper".color(ROLLOUT));
    }

    /// Steps (a)-(g) of §4.5: pre-check, optional shutdown, configure,
    /// fire-and-forget ack, then persist `/snapshot` and `/hash`.
    async fn rollout(&mut self) -> Result<(), warden_zk::CscError> {
        self.hints.set_state(PodState::LeaderConfiguring);
        let mut pods = self.snapshots.get("local").cloned().unwrap_or_default();
        let mut uuids: Vec<String> = pods.keys().cloned().collect();
        uuids.sort();

        for uuid in &uuids {
            if pods[uuid].control_url("check").is_none() {
                self.reschedule();
                return Ok(());
            }
        }

        let dependencies = self.dependencies_snapshot();

        if let Verdict::Abort = self.phase("check", &mut uuids, &mut pods, &dependencies).await {
            self.reschedule();
            return Ok(());
        }

        if self.config.full_shutdown
            && let Verdict::Abort = self.phase("off", &mut uuids, &mut pods, &dependencies).await {
                self.reschedule();
                return Ok(());
            }

        if let Verdict::Abort = self.phase("on", &mut uuids, &mut pods, &dependencies).await {
            self.reschedule();
            return Ok(());
        }

        self.ack(&uuids, &pods, &dependencies).await;

        self.csc.set(&self.snapshot_path, &serde_json::to_vec(&pods).unwrap_or_default()).await?;
        self.snapshots.insert("local".to_string(), pods.clone());
        let hash = content_hash(&self.snapshots);
        self.csc.set(&self.hash_path, hash.as_bytes()).await?;

        self.dirty = false;
        self.refresh_last(pods);
        self.next_probe = Instant::now();
        self.hints.set_state(PodState::Leader);
        info!(cluster = %self.cluster, "{}", "rollout complete".color(ROLLOUT));
        Ok(())
    }

    /// Runs one rollout phase (`check`/`off`/`on`) over the peer set,
    /// sequentially or fanned out per `config.sequential`, dropping any
    /// peer that answers 410 and aborting on anything else but 200.
    async fn phase(
        &self,
        task: &str,
        uuids: &mut Vec<String>,
        pods: &mut BTreeMap<String, Breadcrumbs>,
        dependencies: &BTreeMap<String, BTreeMap<String, Breadcrumbs>>,
    ) -> Verdict {
        let timeout = self.config.grace.mul_f64(1.25);
        let mut gone = Vec::new();
        let mut aborted = false;

        if self.config.sequential {
            for uuid in uuids.iter() {
                match self.post_one(task, uuid, pods, dependencies, timeout).await {
                    PeerResult::Ok => {}
                    PeerResult::Gone => gone.push(uuid.clone()),
                    PeerResult::Abort => {
                        aborted = true;
                        break;
                    }
                }
            }
        } else {
            let results = futures_util::future::join_all(
                uuids.iter().map(|uuid| self.post_one(task, uuid, pods, dependencies, timeout)),
            )
            .await;
            for (uuid, result) in uuids.iter().zip(results) {
                match result {
                    PeerResult::Ok => {}
                    PeerResult::Gone => gone.push(uuid.clone()),
                    PeerResult::Abort => aborted = true,
                }
            }
        }

        for uuid in gone {
            pods.remove(&uuid);
            uuids.retain(|u| u != &uuid);
        }
        if aborted { Verdict::Abort } else { Verdict::Continue }
    }

    async fn ack(
        &self,
        uuids: &[String],
        pods: &BTreeMap<String, Breadcrumbs>,
        dependencies: &BTreeMap<String, BTreeMap<String, Breadcrumbs>>,
    ) {
        let timeout = self.config.grace.mul_f64(1.25);
        let futs = uuids.iter().map(|uuid| self.post_one("ok", uuid, pods, dependencies, timeout));
        let _ = futures_util::future::join_all(futs).await;
    }

    async fn post_one(
        &self,
        task: &str,
        uuid: &str,
        pods: &BTreeMap<String, Breadcrumbs>,
        dependencies: &BTreeMap<String, BTreeMap<String, Breadcrumbs>>,
        timeout: Duration,
    ) -> PeerResult {
        let Some(bc) = pods.get(uuid) else { return PeerResult::Gone };
        let Some(url) = bc.control_url(task) else { return PeerResult::Abort };
        let Some(view) = ClusterView::for_pod(uuid, pods.clone(), dependencies.clone()) else {
            return PeerResult::Abort;
        };
        match self.http.post(&url).json(&view).timeout(timeout).send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => PeerResult::Ok,
            Ok(resp) if resp.status() == reqwest::StatusCode::GONE => PeerResult::Gone,
            _ => PeerResult::Abort,
        }
    }
}

enum PeerResult {
    Ok,
    Gone,
    Abort,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bc(ip: &str, control_port: u16, host_port: u16) -> Breadcrumbs {
        Breadcrumbs {
            cluster: "web".into(),
            namespace: "default".into(),
            port: control_port,
            ip: ip.into(),
            public: ip.into(),
            ports: BTreeMap::from([(control_port.to_string(), host_port)]),
            node: "node".into(),
            task: "task".into(),
            application: "app".into(),
            seq: 0,
        }
    }

    #[test]
    fn dependencies_snapshot_excludes_local() {
        let mut snapshots: Snapshots = BTreeMap::new();
        snapshots.insert("local".into(), BTreeMap::from([("u1".into(), bc("10.0.0.1", 8080, 100))]));
        snapshots.insert("zookeeper".into(), BTreeMap::new());
        let deps: BTreeMap<_, _> =
            snapshots.iter().filter(|(k, _)| k.as_str() != "local").map(|(k, v)| (k.clone(), v.clone())).collect();
        assert_eq!(deps.len(), 1);
        assert!(deps.contains_key("zookeeper"));
    }
}
