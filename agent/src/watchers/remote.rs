//! Remote Watcher (§4.4): one instance per declared dependency. Tracks
//! another cluster's (or a glob of clusters') `/snapshot` node and feeds the
//! merged pod map to the Clustering Model.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, select_all};
use glob::Pattern;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use warden_types::Breadcrumbs;
use warden_zk::{Csc, CscError};

use crate::model::ModelEvent;
use crate::paths;

const CLUSTERS_ROOT: &str = "/ochopod/clusters";

/// How a dependency name in `ReactiveConfig::depends_on` resolves to one or
/// more clusters: an absolute `/namespace.cluster` form, a bare name
/// resolved within the pod's own namespace, or a glob matched against every
/// cluster in that namespace.
#[derive(Debug, Clone)]
enum DependencySpec {
    Absolute { namespace: String, cluster: String },
    Named(String),
    Glob(String),
}

impl DependencySpec {
    fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix('/')
            && let Some((namespace, cluster)) = rest.split_once('.') {
                return DependencySpec::Absolute { namespace: namespace.to_string(), cluster: cluster.to_string() };
            }
        if raw.contains(['*', '?', '[']) { DependencySpec::Glob(raw.to_string()) } else { DependencySpec::Named(raw.to_string()) }
    }
}

/// Runs until cancelled or until a read fails, at which point it reports a
/// single `WatcherFailure` and exits (the Coordinator resets).
pub async fn run(
    csc: Arc<Csc>,
    namespace: String,
    owning_cluster: String,
    dependency: String,
    tx: mpsc::Sender<ModelEvent>,
    cancel: CancellationToken,
) {
    let spec = DependencySpec::parse(&dependency);
    let mut last: BTreeMap<String, Breadcrumbs> = BTreeMap::new();
    let mut watchers: Vec<BoxFuture<'static, ()>> = Vec::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut dirty = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                if !dirty {
                    continue;
                }
                dirty = false;
                match arm_and_read(&csc, &namespace, &owning_cluster, &spec).await {
                    Ok((pods, new_watchers)) => {
                        if new_watchers.is_empty() {
                            // Nothing to watch yet (e.g. the dependency has no
                            // leader). Keep polling every tick until it appears.
                            dirty = true;
                        }
                        watchers = new_watchers;
                        if pods != last {
                            last = pods.clone();
                            if tx.send(ModelEvent::SnapshotUpdate { key: dependency.clone(), pods }).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        warn!(dependency = %dependency, %err, "remote watcher read failed");
                        let _ = tx.send(ModelEvent::WatcherFailure).await;
                        return;
                    }
                }
            }
            _ = wait_any(&mut watchers) => {
                dirty = true;
            }
        }
    }
}

/// Waits for whichever of a dynamic set of armed watchers fires first.
/// Pends forever on an empty set so `cancel`/`ticker` remain live branches.
async fn wait_any(watchers: &mut Vec<BoxFuture<'static, ()>>) {
    if watchers.is_empty() {
        std::future::pending::<()>().await;
    } else {
        let armed = std::mem::take(watchers);
        select_all(armed).await;
    }
}

type ArmResult = Result<(BTreeMap<String, Breadcrumbs>, Vec<BoxFuture<'static, ()>>), CscError>;

async fn arm_and_read(csc: &Csc, namespace: &str, owning_cluster: &str, spec: &DependencySpec) -> ArmResult {
    match spec {
        DependencySpec::Absolute { namespace, cluster } => read_single(csc, namespace, cluster).await,
        DependencySpec::Named(cluster) => read_single(csc, namespace, cluster).await,
        DependencySpec::Glob(pattern) => read_glob(csc, namespace, owning_cluster, pattern).await,
    }
}

async fn read_single(csc: &Csc, namespace: &str, cluster: &str) -> ArmResult {
    let snapshot_path = paths::snapshot(namespace, cluster);
    match csc.get_and_watch(&snapshot_path).await {
        Ok((data, _version, watcher)) => {
            let pods = serde_json::from_slice(&data).unwrap_or_default();
            Ok((pods, vec![Box::pin(async move { watcher.changed().await; }) as BoxFuture<'static, ()>]))
        }
        Err(CscError::NoNode(_)) => Ok((BTreeMap::new(), Vec::new())),
        Err(err) => Err(err),
    }
}

async fn read_glob(csc: &Csc, namespace: &str, owning_cluster: &str, pattern: &str) -> ArmResult {
    let glob = Pattern::new(pattern).unwrap_or_else(|_| Pattern::new("\0unmatchable").expect("literal is valid"));
    let prefix = format!("{namespace}.");

    let (children, root_watcher) = match csc.list_and_watch_children(CLUSTERS_ROOT).await {
        Ok(result) => result,
        Err(err) => return Err(err),
    };

    let matches: Vec<String> = children
        .into_iter()
        .filter_map(|child| child.strip_prefix(&prefix).map(str::to_string))
        .filter(|cluster| cluster != owning_cluster && glob.matches(cluster))
        .collect();

    let mut pods = BTreeMap::new();
    let mut watchers: Vec<BoxFuture<'static, ()>> = vec![Box::pin(async move { root_watcher.changed().await; })];
    for cluster in &matches {
        let snapshot_path = paths::snapshot(namespace, cluster);
        match csc.get_and_watch(&snapshot_path).await {
            Ok((data, _version, watcher)) => {
                if let Ok(map) = serde_json::from_slice::<BTreeMap<String, Breadcrumbs>>(&data) {
                    pods.extend(map);
                }
                watchers.push(Box::pin(async move { watcher.changed().await; }));
            }
            Err(CscError::NoNode(_)) => {}
            Err(err) => return Err(err),
        }
    }
    Ok((pods, watchers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_absolute_namespaced_and_glob_forms() {
        match DependencySpec::parse("/prod.zookeeper") {
            DependencySpec::Absolute { namespace, cluster } => {
                assert_eq!(namespace, "prod");
                assert_eq!(cluster, "zookeeper");
            }
            other => panic!("expected Absolute, got {other:?}"),
        }
        match DependencySpec::parse("zookeeper") {
            DependencySpec::Named(cluster) => assert_eq!(cluster, "zookeeper"),
            other => panic!("expected Named, got {other:?}"),
        }
        match DependencySpec::parse("kafka-*") {
            DependencySpec::Glob(pattern) => assert_eq!(pattern, "kafka-*"),
            other => panic!("expected Glob, got {other:?}"),
        }
    }
}
