use std::collections::BTreeMap;

use md5::{Digest, Md5};

use crate::breadcrumbs::Breadcrumbs;

/// The aggregated view the Clustering Model hashes: `"local"` plus one entry
/// per declared dependency, each mapping pod uuid to its Breadcrumbs.
/// `BTreeMap` is used throughout (rather than a hash map) so that
/// serialization order is deterministic at every nesting level, per the
/// "hash canonicalization" design note -- otherwise identical cluster states
/// could hash differently depending on iteration order.
pub type Snapshots = BTreeMap<String, BTreeMap<String, Breadcrumbs>>;

/// MD5 over the canonical JSON serialization of `snapshots`, rendered as
/// colon-separated lowercase hex bytes (matching the original
/// `':'.join(c.encode('hex') for c in digest)` formatting so the value
/// recorded at the `/hash` node stays human-legible).
pub fn content_hash(snapshots: &Snapshots) -> String {
    let canonical = serde_json::to_vec(snapshots).expect("BTreeMap<String, _> always serializes");
    let digest = Md5::digest(&canonical);
    digest
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breadcrumbs(seq: u32) -> Breadcrumbs {
        Breadcrumbs {
            cluster: "web".into(),
            namespace: "marathon".into(),
            port: 8080,
            ip: "10.0.0.1".into(),
            public: "54.0.0.1".into(),
            ports: BTreeMap::new(),
            node: "node".into(),
            task: "task".into(),
            application: "app".into(),
            seq,
        }
    }

    #[test]
    fn hash_is_stable_across_insertion_order() {
        let mut a: Snapshots = BTreeMap::new();
        a.insert(
            "local".into(),
            BTreeMap::from([("u1".to_string(), breadcrumbs(1)), ("u2".to_string(), breadcrumbs(2))]),
        );
        a.insert("zookeeper".into(), BTreeMap::new());

        let mut b: Snapshots = BTreeMap::new();
        b.insert("zookeeper".into(), BTreeMap::new());
        b.insert(
            "local".into(),
            BTreeMap::from([("u2".to_string(), breadcrumbs(2)), ("u1".to_string(), breadcrumbs(1))]),
        );

        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn hash_changes_when_content_changes() {
        let mut a: Snapshots = BTreeMap::new();
        a.insert("local".into(), BTreeMap::from([("u1".to_string(), breadcrumbs(1))]));
        let mut b = a.clone();
        b.get_mut("local").unwrap().insert("u2".to_string(), breadcrumbs(2));

        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn hash_format_is_colon_separated_hex() {
        let snapshots: Snapshots = BTreeMap::new();
        let hash = content_hash(&snapshots);
        assert_eq!(hash.split(':').count(), 16);
        assert!(hash.split(':').all(|b| b.len() == 2 && u8::from_str_radix(b, 16).is_ok()));
    }
}
