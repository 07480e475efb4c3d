use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Immutable boot-time identity of a pod, captured once and written into its
/// ephemeral registration node (`/ochopod/clusters/<namespace>.<cluster>/pods/<uuid>.<seq>`).
///
/// `seq` is filled in once the coordination store has assigned a sequence
/// number; until then it is absent from the serialized payload so the first
/// registration attempt can omit it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Breadcrumbs {
    pub cluster: String,
    pub namespace: String,
    pub port: u16,
    pub ip: String,
    pub public: String,
    /// Exposed container port (as a string) -> host-visible port.
    pub ports: BTreeMap<String, u16>,
    pub node: String,
    pub task: String,
    pub application: String,
    pub seq: u32,
}

impl Breadcrumbs {
    /// Host-visible URL for this pod's control surface, remapping the
    /// control port through its `ports` table the way a rollout must before
    /// it can POST to a peer.
    pub fn control_url(&self, path: &str) -> Option<String> {
        let host_port = self.ports.get(&self.port.to_string())?;
        Some(format!(
            "http://{}:{}/control/{}",
            self.ip,
            host_port,
            path.trim_start_matches('/')
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Breadcrumbs {
        Breadcrumbs {
            cluster: "database".into(),
            namespace: "my-service".into(),
            port: 8080,
            ip: "10.0.0.1".into(),
            public: "54.1.2.3".into(),
            ports: BTreeMap::from([("8080".into(), 31000)]),
            node: "i-abc".into(),
            task: "my-service.database.4c27".into(),
            application: "my-service.database.342".into(),
            seq: 19,
        }
    }

    #[test]
    fn control_url_remaps_through_ports_table() {
        let b = sample();
        let url = b.control_url("check").unwrap();
        assert_eq!(url, "http://10.0.0.1:31000/control/check");
    }

    #[test]
    fn control_url_is_none_when_control_port_not_exposed() {
        let mut b = sample();
        b.ports.clear();
        assert!(b.control_url("check").is_none());
    }

    #[test]
    fn round_trips_through_json() {
        let b = sample();
        let js = serde_json::to_string(&b).unwrap();
        let back: Breadcrumbs = serde_json::from_str(&js).unwrap();
        assert_eq!(b, back);
    }
}
