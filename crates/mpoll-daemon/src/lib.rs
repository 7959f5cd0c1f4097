// SPDX-License-Identifier: MIT

//! The polling daemon: the Executor Repository, the Config Watcher, and the
//! Lifecycle Controller that ties them together (§4).

pub mod engine;
mod error;
mod lifecycle;
mod watcher;

pub use engine::{BoundedPool, ExecutorRepository, ManagedServer, PoolStats};
pub use error::LifecycleError;
pub use lifecycle::{run_standalone, LifecycleConfig, LifecycleController, SHUTDOWN_SETTLE};
pub use watcher::ConfigWatcher;
