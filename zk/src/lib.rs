//! Coordination Store Client: the sole point of contact with the ZooKeeper
//! ensemble. Everything above this crate (the Coordinator, the watchers,
//! the Clustering Model) talks to the store only through [`Csc`] and never
//! touches `zookeeper_client` directly.

mod connection;
mod error;
mod lock;

pub use connection::{Csc, ConnectionState};
pub use error::CscError;
pub use lock::LockGuard;
pub use zookeeper_client::OneshotWatcher;
