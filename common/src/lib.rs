//! Ambient stack shared by every binary in the workspace: structured
//! logging, graceful shutdown, and an optional Prometheus metrics server.
//! Mirrors the teacher's `eosin-common` crate, trimmed to what a
//! coordination agent needs (no postgres/redis/keycloak pools here).

pub mod colors;
pub mod logging;
pub mod metrics;
pub mod shutdown;
