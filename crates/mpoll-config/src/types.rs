// SPDX-License-Identifier: MIT

//! On-disk config shapes. Deserialized directly from JSON/YAML, then
//! turned into `mpoll_core::Server` by [`crate::parse::build_server`].

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RawServer {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub run_period_seconds: Option<u64>,
    #[serde(default)]
    pub queries: Vec<RawQuery>,
    #[serde(default)]
    pub writers: Vec<RawWriter>,
}

#[derive(Debug, Deserialize)]
pub struct RawQuery {
    pub object_name: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub writers: Vec<RawWriter>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawWriter {
    File { name: String, path: String },
    Graphite { name: String, addr: String, #[serde(default = "default_prefix")] prefix: String },
}

fn default_prefix() -> String {
    "mpoll".to_string()
}
