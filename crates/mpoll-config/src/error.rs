// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, String),
    #[error("{0}: unsupported file extension")]
    UnsupportedExtension(PathBuf),
    #[error("server {0}: writer {1:?} redeclared with a different definition")]
    ConflictingWriterDefinition(String, String),
}
