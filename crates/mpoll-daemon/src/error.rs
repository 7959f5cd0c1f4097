// SPDX-License-Identifier: MIT

//! Daemon-level error taxonomy (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("already running")]
    AlreadyRunning,
    #[error("not running")]
    NotRunning,
    #[error("config load failed: {0}")]
    Config(#[from] mpoll_config::ConfigError),
    #[error("failed to watch config path: {0}")]
    Watch(#[source] notify::Error),
    #[error("writer setup failed: {0}")]
    WriterSetup(#[from] mpoll_core::WriterError),
}
