// SPDX-License-Identifier: MIT

//! Concrete `OutputWriter` sink adapters (§1, §3, §4.3).
//!
//! Each variant implements the same four-capability surface
//! (`start`/`validate_setup`/`write`/`close`); the engine never knows which
//! one it is talking to.

pub mod file;
pub mod graphite;
pub mod memory;

pub use file::JsonLineFileWriter;
pub use graphite::GraphiteWriter;
pub use memory::MemoryWriter;
