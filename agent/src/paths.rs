//! ZooKeeper layout, per §6:
//!
//! ```text
//! /ochopod/clusters/<namespace>.<cluster>/
//!   pods/<uuid>.<10-digit-seq>   (ephemeral, JSON Breadcrumbs)
//!   coordinator                  (lock)
//!   snapshot                     (ephemeral, JSON {uuid: Breadcrumbs})
//!   hash                         (persistent, ASCII hex:hex:... MD5)
//! ```

pub fn cluster_root(namespace: &str, cluster: &str) -> String {
    format!("/ochopod/clusters/{namespace}.{cluster}")
}

pub fn pods(namespace: &str, cluster: &str) -> String {
    format!("{}/pods", cluster_root(namespace, cluster))
}

/// Trailing-slash-free prefix handed to `create_ephemeral_sequential`: the
/// store appends `<uuid>.` plus the 10-digit sequence.
pub fn pod_prefix(namespace: &str, cluster: &str, uuid: &str) -> String {
    format!("{}/{uuid}.", pods(namespace, cluster))
}

pub fn coordinator_lock(namespace: &str, cluster: &str) -> String {
    format!("{}/coordinator", cluster_root(namespace, cluster))
}

pub fn snapshot(namespace: &str, cluster: &str) -> String {
    format!("{}/snapshot", cluster_root(namespace, cluster))
}

pub fn hash(namespace: &str, cluster: &str) -> String {
    format!("{}/hash", cluster_root(namespace, cluster))
}

/// The uuid prefix of a `pods` child name (the part before the first
/// `.<seq>` token), used by the Local Watcher to key its map.
pub fn uuid_prefix(child: &str) -> &str {
    child.split_once('.').map(|(uuid, _)| uuid).unwrap_or(child)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_spec() {
        assert_eq!(cluster_root("default", "web"), "/ochopod/clusters/default.web");
        assert_eq!(pods("default", "web"), "/ochopod/clusters/default.web/pods");
        assert_eq!(coordinator_lock("default", "web"), "/ochopod/clusters/default.web/coordinator");
        assert_eq!(snapshot("default", "web"), "/ochopod/clusters/default.web/snapshot");
        assert_eq!(hash("default", "web"), "/ochopod/clusters/default.web/hash");
    }

    #[test]
    fn uuid_prefix_strips_sequence_suffix() {
        assert_eq!(uuid_prefix("9b1f.0000000042"), "9b1f");
        assert_eq!(uuid_prefix("no-dot"), "no-dot");
    }
}
