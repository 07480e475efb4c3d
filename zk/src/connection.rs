use std::time::Duration;

use tokio::sync::watch;
use zookeeper_client as zk;

use crate::error::CscError;
use crate::lock::LockGuard;

/// Connection-state transitions the Coordinator and Model react to.
///
/// Collapses `zookeeper_client::SessionState`'s six states down to the
/// three the distillation names: `SyncConnected`/`ConnectedReadOnly` are
/// both "connected", `Disconnected` is a transient "suspended" (the
/// client is retrying under the hood), and the three terminal states all
/// mean the session is gone and must be re-established from scratch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Suspended,
    Lost,
}

impl ConnectionState {
    fn from_session(state: zk::SessionState) -> Self {
        use zk::SessionState::*;
        match state {
            SyncConnected | ConnectedReadOnly => ConnectionState::Connected,
            Disconnected => ConnectionState::Suspended,
            AuthFailed | Expired | Closed => ConnectionState::Lost,
        }
    }
}

/// Durable handle to the ensemble. Wraps a `zookeeper_client::Client` and
/// republishes its session state on a `watch` channel so the Coordinator
/// can `select!` on state changes alongside everything else it does.
pub struct Csc {
    client: zk::Client,
    state_rx: watch::Receiver<ConnectionState>,
}

impl Csc {
    pub async fn connect(ensemble: &str, session_timeout: Duration) -> Result<Self, CscError> {
        let client = zk::Client::connector().with_session_timeout(session_timeout).connect(ensemble).await?;
        let mut session_watcher = client.state_watcher();
        let (state_tx, state_rx) =
            watch::channel(ConnectionState::from_session(session_watcher.peek_state()));
        tokio::spawn(async move {
            loop {
                let state = session_watcher.changed().await;
                if state_tx.send(ConnectionState::from_session(state)).is_err() {
                    return;
                }
                if state.is_terminated() {
                    return;
                }
            }
        });
        Ok(Csc { client, state_rx })
    }

    /// Most recently observed connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection-state transitions. `watch::Receiver::changed`
    /// resolves on every transition, including repeats of `Suspended`.
    pub fn state_watcher(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Creates `path` as a persistent node if absent. Idempotent.
    pub async fn ensure_persistent(&self, path: &str) -> Result<(), CscError> {
        let options = zk::CreateMode::Persistent.with_acls(zk::Acls::anyone_all());
        match self.client.create(path, b"", &options).await {
            Ok(_) | Err(zk::Error::NodeExists) => Ok(()),
            Err(err) => Err(CscError::from_zk(path, err)),
        }
    }

    pub async fn create_ephemeral(&self, path: &str, data: &[u8]) -> Result<(), CscError> {
        let options = zk::CreateMode::Ephemeral.with_acls(zk::Acls::anyone_all());
        self.client.create(path, data, &options).await.map(|_| ()).map_err(|err| CscError::from_zk(path, err))
    }

    /// Creates an ephemeral-sequential child of `parent` and returns its
    /// full path (e.g. `/pods/<uuid>.0000000042`) and the assigned sequence
    /// number. `CreateSequence`'s `Display` impl already zero-pads to the
    /// protocol's 10-digit width.
    pub async fn create_ephemeral_sequential(&self, parent: &str, data: &[u8]) -> Result<(String, i64), CscError> {
        let options = zk::CreateMode::EphemeralSequential.with_acls(zk::Acls::anyone_all());
        let (_, sequence) = self
            .client
            .create(parent, data, &options)
            .await
            .map_err(|err| CscError::from_zk(parent, err))?;
        Ok((format!("{parent}{sequence}"), sequence.into_i64()))
    }

    pub async fn get(&self, path: &str) -> Result<(Vec<u8>, i32), CscError> {
        let (data, stat) = self.client.get_data(path).await.map_err(|err| CscError::from_zk(path, err))?;
        Ok((data, stat.version))
    }

    /// Reads the node's current value and arms a one-shot watch for the
    /// next data change, deletion, or session expiry.
    pub async fn get_and_watch(&self, path: &str) -> Result<(Vec<u8>, i32, zk::OneshotWatcher), CscError> {
        let (data, stat, watcher) =
            self.client.get_and_watch_data(path).await.map_err(|err| CscError::from_zk(path, err))?;
        Ok((data, stat.version, watcher))
    }

    pub async fn set(&self, path: &str, data: &[u8]) -> Result<(), CscError> {
        self.client.set_data(path, data, None).await.map(|_| ()).map_err(|err| CscError::from_zk(path, err))
    }

    pub async fn list_children(&self, path: &str) -> Result<Vec<String>, CscError> {
        self.client.list_children(path).await.map_err(|err| CscError::from_zk(path, err))
    }

    /// Lists children and arms a one-shot watch for the next child
    /// creation/deletion under `path`.
    pub async fn list_and_watch_children(&self, path: &str) -> Result<(Vec<String>, zk::OneshotWatcher), CscError> {
        self.client.list_and_watch_children(path).await.map_err(|err| CscError::from_zk(path, err))
    }

    /// Contends a named lock at `path`, giving up after `timeout`. The
    /// returned guard releases the lock (deletes its sequential node) on
    /// drop, mirroring the underlying client's own `LockClient::drop`.
    pub async fn lock(&self, path: &str, timeout: Duration) -> Result<LockGuard, CscError> {
        let prefix = zk::LockPrefix::new_curator(path, "lock-").map_err(|err| CscError::from_zk(path, err))?;
        let options = zk::LockOptions::new(zk::Acls::anyone_all());
        match tokio::time::timeout(timeout, self.client.lock(prefix, b"", options)).await {
            Ok(Ok(lock)) => Ok(LockGuard::new(lock.into_owned())),
            Ok(Err(err)) => Err(CscError::from_zk(path, err)),
            Err(_) => Err(CscError::LockTimeout { path: path.to_string(), timeout }),
        }
    }
}
