//! Coordinator (§4.2): one per pod. Owns the ZooKeeper session, the
//! ephemeral registration, the `/coordinator` lock, and the leader-only
//! Clustering Model + its Watchers.

use std::sync::Arc;
use std::time::Duration;

use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use warden_common::colors::COORDINATOR;
use warden_types::{Breadcrumbs, Hints, PodState, ReactiveConfig};
use warden_zk::{ConnectionState, Csc};

use crate::api::Model as ProbeModel;
use crate::model::{ClusteringModel, ModelExit};
use crate::paths;
use crate::watchers;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const RESET_PAUSE: Duration = Duration::from_secs(1);
const COLLISION_PAUSE: Duration = Duration::from_secs(5);

pub struct Coordinator {
    namespace: String,
    cluster: String,
    uuid: String,
    ensemble: String,
    session_timeout: Duration,
    breadcrumbs: Breadcrumbs,
    hints: Hints,
    reactive: ReactiveConfig,
    probe_cb: Arc<dyn ProbeModel>,
    reset_rx: mpsc::Receiver<()>,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uuid: String,
        ensemble: String,
        session_timeout: Duration,
        breadcrumbs: Breadcrumbs,
        hints: Hints,
        reactive: ReactiveConfig,
        probe_cb: Arc<dyn ProbeModel>,
        reset_rx: mpsc::Receiver<()>,
    ) -> Self {
        Coordinator {
            namespace: breadcrumbs.namespace.clone(),
            cluster: breadcrumbs.cluster.clone(),
            uuid,
            ensemble,
            session_timeout,
            breadcrumbs,
            hints,
            reactive,
            probe_cb,
            reset_rx,
        }
    }

    /// Runs forever: `initial -> wait_for_cnx -> spin -> start_controller ->
    /// lock -> reset -> initial`, preserving `seq` across every reset (I1).
    pub async fn run(mut self) {
        let mut seq: Option<(i64, String)> = None;
        loop {
            if let Err(err) = self.cycle(&mut seq).await {
                warn!(cluster = %self.cluster, %err, "{}", "coordinator resetting".color(COORDINATOR));
            }
            self.hints.set_state(PodState::Follower);
            tokio::time::sleep(RESET_PAUSE).await;
        }
    }

    async fn cycle(&mut self, seq: &mut Option<(i64, String)>) -> Result<(), crate::error::CoordinatorError> {
        // initial
        let csc = Arc::new(Csc::connect(&self.ensemble, self.session_timeout).await?);
        info!(cluster = %self.cluster, "{}", "session opened".color(COORDINATOR));

        // wait_for_cnx
        let mut state_watcher = csc.state_watcher();
        while *state_watcher.borrow() != ConnectionState::Connected {
            state_watcher.changed().await.ok();
        }

        csc.ensure_persistent(&paths::pods(&self.namespace, &self.cluster)).await?;
        csc.ensure_persistent(&paths::hash(&self.namespace, &self.cluster)).await?;

        self.register(&csc, seq).await?;
        self.hints.set_state(PodState::Follower);

        // spin: bounded-timeout lock acquisition, retried while connected.
        let lock_path = paths::coordinator_lock(&self.namespace, &self.cluster);
        let guard = loop {
            if *state_watcher.borrow() != ConnectionState::Connected {
                return Err(crate::error::CoordinatorError::Csc { source: warden_zk::CscError::Disconnected });
            }
            match csc.lock(&lock_path, LOCK_TIMEOUT).await {
                Ok(guard) => break guard,
                Err(warden_zk::CscError::LockTimeout { .. }) => continue,
                Err(err) => return Err(err.into()),
            }
        };
        info!(cluster = %self.cluster, "{}", "acquired leader lock".color(COORDINATOR));

        // start_controller
        self.hints.set_state(PodState::Leader);
        let generation = CancellationToken::new();
        let (model_tx, model_rx) = mpsc::channel(64);

        tokio::spawn(watchers::local::run(
            csc.clone(),
            self.namespace.clone(),
            self.cluster.clone(),
            model_tx.clone(),
            generation.clone(),
        ));
        for dependency in &self.reactive.depends_on {
            tokio::spawn(watchers::remote::run(
                csc.clone(),
                self.namespace.clone(),
                self.cluster.clone(),
                dependency.clone(),
                model_tx.clone(),
                generation.clone(),
            ));
        }

        let model = ClusteringModel::new(
            self.namespace.clone(),
            self.cluster.clone(),
            self.uuid.clone(),
            csc.clone(),
            self.hints.clone(),
            self.reactive.clone(),
            self.probe_cb.clone(),
            model_rx,
            generation.clone(),
        );
        let mut model_handle = tokio::spawn(model.run());

        // lock: any deviation resets the whole session.
        let exit = tokio::select! {
            result = &mut model_handle => {
                result.unwrap_or(ModelExit::WatcherFailure)
            }
            _ = self.reset_rx.recv() => {
                info!(cluster = %self.cluster, "{}", "external reset requested".color(COORDINATOR));
                generation.cancel();
                model_handle.await.unwrap_or(ModelExit::Cancelled)
            }
            _ = state_watcher.changed() => {
                warn!(cluster = %self.cluster, "{}", "connection state changed while leading".color(COORDINATOR));
                generation.cancel();
                model_handle.await.unwrap_or(ModelExit::Cancelled)
            }
        };
        generation.cancel();
        drop(guard);

        match exit {
            ModelExit::Cancelled => Ok(()),
            ModelExit::WatcherFailure => {
                error!(cluster = %self.cluster, "{}", "watcher failure, resetting".color(COORDINATOR));
                Err(crate::error::CoordinatorError::Csc { source: warden_zk::CscError::Disconnected })
            }
        }
    }

    /// Creates (or, on reconnect, recreates at the same path) this pod's
    /// ephemeral registration node. A collision on reconnect means the old
    /// session's node has not yet expired; retry rather than taking a new
    /// sequence number (critical for stateful peers, per I1).
    async fn register(&mut self, csc: &Csc, seq: &mut Option<(i64, String)>) -> Result<(), crate::error::CoordinatorError> {
        let data = serde_json::to_vec(&self.breadcrumbs).unwrap_or_default();
        match seq {
            None => {
                let prefix = paths::pod_prefix(&self.namespace, &self.cluster, &self.uuid);
                let (full_path, assigned) = csc.create_ephemeral_sequential(&prefix, &data).await?;
                self.breadcrumbs.seq = assigned as u32;
                self.hints.set_seq(self.breadcrumbs.seq);
                // The sequence is only known after creation; augment the
                // node with it rather than guessing it into the initial payload.
                let augmented = serde_json::to_vec(&self.breadcrumbs).unwrap_or_default();
                csc.set(&full_path, &augmented).await?;
                *seq = Some((assigned, full_path));
            }
            Some((assigned, full_path)) => {
                self.breadcrumbs.seq = *assigned as u32;
                loop {
                    match csc.create_ephemeral(full_path, &data).await {
                        Ok(()) => break,
                        Err(warden_zk::CscError::NodeExists(_)) => {
                            tokio::time::sleep(COLLISION_PAUSE).await;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
        Ok(())
    }
}
