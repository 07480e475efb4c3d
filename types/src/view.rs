use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::breadcrumbs::Breadcrumbs;

/// The structure passed to every user callback (`configure`, `probe`,
/// `can_configure`, ...): `pods` is the local cluster, `dependencies` maps
/// each declared dependency name to its aggregated snapshot, `key` is this
/// pod's uuid, `index` is this pod's rank among `pods` sorted ascending by
/// uuid (I5: consecutive 0..size-1 at every configuration boundary).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterView {
    pub pods: BTreeMap<String, Breadcrumbs>,
    pub dependencies: BTreeMap<String, BTreeMap<String, Breadcrumbs>>,
    pub key: String,
    pub seq: u32,
    pub index: usize,
    pub size: usize,
}

impl ClusterView {
    /// Builds the view a given recipient `key` would see for a rollout over
    /// `pods`/`dependencies`: `index`/`size`/`seq` are recomputed from
    /// `pods` (I5), `key` is substituted per recipient.
    pub fn for_pod(
        key: &str,
        pods: BTreeMap<String, Breadcrumbs>,
        dependencies: BTreeMap<String, BTreeMap<String, Breadcrumbs>>,
    ) -> Option<ClusterView> {
        let mut sorted: Vec<&String> = pods.keys().collect();
        sorted.sort();
        let index = sorted.iter().position(|k| k.as_str() == key)?;
        let seq = pods.get(key)?.seq;
        let size = pods.len();
        Some(ClusterView {
            pods,
            dependencies,
            key: key.to_string(),
            seq,
            index,
            size,
        })
    }

    /// Looks `dependency` up and returns a comma-separated `ip:port` string,
    /// remapping `port` through each peer's `ports` table. `public` selects
    /// the peer's externally reachable IP instead of its internal one. An
    /// unknown dependency yields an empty string (the original SDK asserts
    /// on a missing `port` exposure instead of returning a partial result;
    /// a pod not exposing the requested port is simply dropped here since
    /// panicking inside a user-facing helper is not idiomatic in a service
    /// that must stay up).
    pub fn grep(&self, dependency: &str, port: u16, public: bool) -> String {
        let Some(peers) = self.dependencies.get(dependency) else {
            return String::new();
        };
        let port_key = port.to_string();
        let mut entries: Vec<_> = peers.iter().collect();
        entries.sort_by_key(|(uuid, _)| (*uuid).clone());
        entries
            .into_iter()
            .filter_map(|(_, peer)| {
                let host_port = peer.ports.get(&port_key)?;
                let ip = if public { &peer.public } else { &peer.ip };
                Some(format!("{ip}:{host_port}"))
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(ip: &str, public_ip: &str, port: u16, host_port: u16) -> Breadcrumbs {
        Breadcrumbs {
            cluster: "kafka".into(),
            namespace: "ns".into(),
            port,
            ip: ip.into(),
            public: public_ip.into(),
            ports: BTreeMap::from([(port.to_string(), host_port)]),
            node: "node".into(),
            task: "task".into(),
            application: "app".into(),
            seq: 0,
        }
    }

    #[test]
    fn index_is_rank_among_sorted_uuids() {
        let pods = BTreeMap::from([
            ("b".to_string(), peer("10.0.0.2", "54.0.0.2", 8080, 100)),
            ("a".to_string(), peer("10.0.0.1", "54.0.0.1", 8080, 100)),
        ]);
        let view = ClusterView::for_pod("b", pods, BTreeMap::new()).unwrap();
        assert_eq!(view.index, 1);
        assert_eq!(view.size, 2);
    }

    #[test]
    fn grep_joins_remapped_internal_addresses() {
        let deps = BTreeMap::from([(
            "zookeeper".to_string(),
            BTreeMap::from([
                ("u1".to_string(), peer("10.0.0.1", "54.0.0.1", 2181, 31000)),
                ("u2".to_string(), peer("10.0.0.2", "54.0.0.2", 2181, 31001)),
            ]),
        )]);
        let view = ClusterView {
            pods: BTreeMap::new(),
            dependencies: deps,
            key: "self".into(),
            seq: 0,
            index: 0,
            size: 0,
        };
        assert_eq!(
            view.grep("zookeeper", 2181, false),
            "10.0.0.1:31000,10.0.0.2:31001"
        );
        assert_eq!(
            view.grep("zookeeper", 2181, true),
            "54.0.0.1:31000,54.0.0.2:31001"
        );
    }

    #[test]
    fn grep_on_unknown_dependency_is_empty() {
        let view = ClusterView {
            pods: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            key: "self".into(),
            seq: 0,
            index: 0,
            size: 0,
        };
        assert_eq!(view.grep("nope", 80, false), "");
    }
}
