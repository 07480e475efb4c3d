/// Errors surfaced by the Coordination Store Client.
///
/// Every operation that touches the ensemble can fail with `Disconnected`:
/// per the "any operation may fail with disconnected" contract, callers
/// treat this the same as an explicit reset trigger rather than a
/// recoverable per-call error.
#[derive(Debug, thiserror::Error)]
pub enum CscError {
    #[error("lost connection to the ensemble")]
    Disconnected,

    #[error("session expired")]
    SessionExpired,

    #[error("node already exists: {0}")]
    NodeExists(String),

    #[error("node does not exist: {0}")]
    NoNode(String),

    #[error("timed out acquiring lock {path} after {timeout:?}")]
    LockTimeout { path: String, timeout: std::time::Duration },

    #[error("zookeeper error: {source}")]
    Zk {
        #[from]
        source: zookeeper_client::Error,
    },
}

impl CscError {
    pub(crate) fn from_zk(path: &str, source: zookeeper_client::Error) -> Self {
        use zookeeper_client::Error::*;
        match source {
            ConnectionLoss => CscError::Disconnected,
            SessionExpired => CscError::SessionExpired,
            NodeExists => CscError::NodeExists(path.to_string()),
            NoNode => CscError::NoNode(path.to_string()),
            other => CscError::Zk { source: other },
        }
    }
}
