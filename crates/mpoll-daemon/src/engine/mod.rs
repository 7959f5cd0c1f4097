// SPDX-License-Identifier: MIT

//! The polling engine: bounded pools, per-server triggers, the tick's unit
//! of work, and the repository tying them together (§3, §4).

mod job;
mod pool;
mod repository;
mod scheduler;

pub use job::run_server_job;
pub use pool::{BoundedPool, PoolStats};
pub use repository::{ExecutorRepository, ManagedServer};
pub use scheduler::Trigger;
