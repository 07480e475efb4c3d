//! Local Watcher (§4.3): polls `/pods` every tick and feeds the merged,
//! uuid-keyed map to the Clustering Model under the `"local"` key.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use warden_types::Breadcrumbs;
use warden_zk::{Csc, CscError};

use crate::model::ModelEvent;
use crate::paths;

pub async fn run(csc: Arc<Csc>, namespace: String, cluster: String, tx: mpsc::Sender<ModelEvent>, cancel: CancellationToken) {
    let pods_path = paths::pods(&namespace, &cluster);
    let mut last: BTreeMap<String, Breadcrumbs> = BTreeMap::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                match read(&csc, &pods_path).await {
                    Ok(pods) => {
                        if pods != last {
                            last = pods.clone();
                            if tx.send(ModelEvent::SnapshotUpdate { key: "local".to_string(), pods }).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        warn!(cluster = %cluster, %err, "local watcher read failed");
                        let _ = tx.send(ModelEvent::WatcherFailure).await;
                        return;
                    }
                }
            }
        }
    }
}

async fn read(csc: &Csc, pods_path: &str) -> Result<BTreeMap<String, Breadcrumbs>, CscError> {
    let children = csc.list_children(pods_path).await?;
    let mut pods = BTreeMap::new();
    for child in children {
        let full = format!("{pods_path}/{child}");
        let (data, _version) = csc.get(&full).await?;
        if let Ok(breadcrumbs) = serde_json::from_slice::<Breadcrumbs>(&data) {
            pods.insert(paths::uuid_prefix(&child).to_string(), breadcrumbs);
        }
    }
    Ok(pods)
}
