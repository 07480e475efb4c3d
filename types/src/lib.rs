//! Shared data model for the pod coordination agent: [`Breadcrumbs`] (the
//! immutable boot-time identity of a pod), [`Hints`] (its mutable runtime
//! record) and [`ClusterView`] (the read-only snapshot handed to user
//! callbacks), plus the content-hashing and clustering-model configuration
//! types built on top of them.

pub mod breadcrumbs;
pub mod config;
pub mod hash;
pub mod hints;
pub mod view;

pub use breadcrumbs::Breadcrumbs;
pub use config::{PipedConfig, ReactiveConfig};
pub use hints::{Hints, ProcessState, PodState};
pub use view::ClusterView;
