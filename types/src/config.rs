use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Static, per-cluster configuration for the Clustering Model (§4.5).
/// Defaults recovered from `ochopod.api.Reactive` since `spec.md` leaves
/// them unspecified: these are baked into the pod binary by the model
/// implementor, not environment-driven.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    /// Cadence for the user `probe` callback on the leader.
    #[serde(with = "humantime_serde")]
    pub probe_every: Duration,
    /// Settle time between a detected hash change and reconfiguration.
    #[serde(with = "humantime_serde")]
    pub damper: Duration,
    /// Dependency specifiers for Remote Watchers: exact name, glob, or
    /// absolute `/namespace.cluster` form.
    pub depends_on: Vec<String>,
    /// Send `off` to every peer before `on`.
    pub full_shutdown: bool,
    /// Per-request HTTP deadline sent to peers (the caller adds 25% slack).
    #[serde(with = "humantime_serde")]
    pub grace: Duration,
    /// Post to peers one at a time in sorted order, rather than fanning out.
    pub sequential: bool,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        ReactiveConfig {
            probe_every: Duration::from_secs(60),
            damper: Duration::from_secs(0),
            depends_on: Vec::new(),
            full_shutdown: false,
            grace: Duration::from_secs(60),
            sequential: false,
        }
    }
}

/// Static, per-pod configuration for the Lifecycle Executor's supervised
/// child process (§4.6). Defaults recovered from `ochopod.api.Piped`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipedConfig {
    /// Consecutive sanity-check failures tolerated before turning off.
    pub checks: u32,
    #[serde(with = "humantime_serde")]
    pub check_every: Duration,
    /// Working directory for the child process; unset runs in the agent's cwd.
    pub cwd: Option<String>,
    /// Grace period before a forcible termination signal is sent.
    #[serde(with = "humantime_serde")]
    pub grace: Duration,
    /// Pipe the child's stdout/stderr into the agent's log.
    pub pipe_subprocess: bool,
    /// Interpret the command line as a shell command.
    pub shell: bool,
    /// Deliberately leak the child instead of forcing a kill past grace.
    pub soft: bool,
    /// Always reconfigure on every leader request, even with no dependency
    /// change.
    pub strict: bool,
}

impl Default for PipedConfig {
    fn default() -> Self {
        PipedConfig {
            checks: 1,
            check_every: Duration::from_secs(60),
            cwd: None,
            grace: Duration::from_secs(60),
            pipe_subprocess: false,
            shell: false,
            soft: false,
            strict: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reactive_defaults_match_sdk() {
        let cfg = ReactiveConfig::default();
        assert_eq!(cfg.probe_every, Duration::from_secs(60));
        assert_eq!(cfg.damper, Duration::from_secs(0));
        assert!(cfg.depends_on.is_empty());
        assert!(!cfg.full_shutdown);
        assert_eq!(cfg.grace, Duration::from_secs(60));
        assert!(!cfg.sequential);
    }

    #[test]
    fn piped_defaults_match_sdk() {
        let cfg = PipedConfig::default();
        assert_eq!(cfg.checks, 1);
        assert_eq!(cfg.check_every, Duration::from_secs(60));
        assert_eq!(cfg.cwd, None);
        assert_eq!(cfg.grace, Duration::from_secs(60));
        assert!(!cfg.pipe_subprocess);
        assert!(!cfg.shell);
        assert!(!cfg.soft);
        assert!(!cfg.strict);
    }
}
