/// Errors the Coordinator's own operations can raise, distinct from
/// `warden_zk::CscError` bubbling through it (those just drive a reset).
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("coordination store error: {source}")]
    Csc {
        #[from]
        source: warden_zk::CscError,
    },

    #[error("registration collision on reconnect: {path} still present")]
    RegistrationCollision { path: String },
}

/// Errors surfaced by the Lifecycle Executor's own bookkeeping (user
/// callback failures are reported as HTTP status codes per §4.6/§4.7, not
/// as this enum — this covers the executor's process-management plumbing).
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("failed to spawn child process: {source}")]
    Spawn {
        #[from]
        source: std::io::Error,
    },

    #[error("command queue reply channel dropped before a response was sent")]
    LatchDropped,
}
