use zookeeper_client as zk;

/// Holds a contended lock path. Dropping the guard releases the lock in
/// the background (via the underlying client's own `OwnedLockClient::drop`),
/// so callers express "release the lock" simply by letting the guard go
/// out of scope.
pub struct LockGuard {
    inner: zk::OwnedLockClient,
}

impl LockGuard {
    pub(crate) fn new(inner: zk::OwnedLockClient) -> Self {
        LockGuard { inner }
    }

    /// The server-assigned sequential node path backing this lock.
    pub fn lock_path(&self) -> &str {
        self.inner.lock_path()
    }
}
