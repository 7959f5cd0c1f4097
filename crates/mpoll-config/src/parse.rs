// SPDX-License-Identifier: MIT

//! `parseServers(files, continueOnError) -> list<Server>` (§1, §6).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mpoll_core::{Credentials, OutputWriter, Query, Server, TriggerSpec};
use mpoll_writers::{GraphiteWriter, JsonLineFileWriter};

use crate::error::ConfigError;
use crate::filter::is_process_config_file;
use crate::types::{RawQuery, RawServer, RawWriter};

/// Parse every config file reachable from `path` into a flat list of
/// `Server`s.
///
/// `path` may be a single file (file-mode) or a directory (dir-mode, where
/// entries are filtered by [`is_process_config_file`]). A `path` that no
/// longer exists yields an empty list rather than an error, so a deleted
/// config file reloads to zero servers (§8 scenario 5).
pub fn parse_servers(path: &Path, continue_on_error: bool) -> Result<Vec<Server>, ConfigError> {
    let files = candidate_files(path)?;
    let mut servers = Vec::new();

    for file in files {
        match parse_file(&file) {
            Ok(mut parsed) => servers.append(&mut parsed),
            Err(e) => {
                if continue_on_error {
                    tracing::warn!(file = %file.display(), error = %e, "skipping unparsable config file");
                    continue;
                } else {
                    return Err(e);
                }
            }
        }
    }

    Ok(servers)
}

fn candidate_files(path: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    if path.is_dir() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| is_process_config_file(p))
            .collect();
        entries.sort();
        Ok(entries)
    } else {
        Ok(vec![path.to_path_buf()])
    }
}

fn parse_file(path: &Path) -> Result<Vec<Server>, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let raws: Vec<RawServer> = if is_yaml(path) {
        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?
    } else if is_json(path) {
        serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?
    } else {
        return Err(ConfigError::UnsupportedExtension(path.to_path_buf()));
    };

    raws.into_iter().map(build_server).collect()
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yml") | Some("yaml"))
}

fn is_json(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("json"))
}

/// Build one `Server` from its raw form, resolving every writer definition
/// declared anywhere in the server (its own `writers` and each query's) into
/// a single shared instance keyed by name, so the same writer is started
/// once and closed once even when referenced at both levels (§3, §4.3).
pub(crate) fn build_server(raw: RawServer) -> Result<Server, ConfigError> {
    let identity = format!("{}:{}", raw.host, raw.port);
    let mut by_name: BTreeMap<String, (RawWriter, Arc<dyn OutputWriter>)> = BTreeMap::new();

    let mut intern = |def: &RawWriter| -> Result<Arc<dyn OutputWriter>, ConfigError> {
        let name = writer_name(def);
        if let Some((existing_def, existing)) = by_name.get(&name) {
            if existing_def == def {
                return Ok(Arc::clone(existing));
            }
            return Err(ConfigError::ConflictingWriterDefinition(identity.clone(), name));
        }
        let built = build_writer(def);
        by_name.insert(name, (def.clone(), Arc::clone(&built)));
        Ok(built)
    };

    let server_writers =
        raw.writers.iter().map(&mut intern).collect::<Result<Vec<_>, _>>()?;

    let queries = raw
        .queries
        .into_iter()
        .map(|q| build_query(q, &mut intern))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Server {
        host: raw.host,
        port: raw.port,
        alias: raw.alias,
        credentials: Credentials { username: raw.username, password: raw.password },
        cron_expression: raw.cron,
        run_period_seconds: raw.run_period_seconds,
        queries,
        writers: server_writers,
    })
}

fn build_query(
    raw: RawQuery,
    intern: &mut impl FnMut(&RawWriter) -> Result<Arc<dyn OutputWriter>, ConfigError>,
) -> Result<Query, ConfigError> {
    let writers = raw.writers.iter().map(intern).collect::<Result<Vec<_>, _>>()?;
    Ok(Query {
        object_name: raw.object_name,
        attributes: raw.attributes,
        key_tags: raw.tags,
        writers,
    })
}

fn writer_name(def: &RawWriter) -> String {
    match def {
        RawWriter::File { name, .. } => name.clone(),
        RawWriter::Graphite { name, .. } => name.clone(),
    }
}

fn build_writer(def: &RawWriter) -> Arc<dyn OutputWriter> {
    match def {
        RawWriter::File { name, path } => Arc::new(JsonLineFileWriter::new(name.clone(), path.clone())),
        RawWriter::Graphite { name, addr, prefix } => {
            Arc::new(GraphiteWriter::new(name.clone(), addr.clone(), prefix.clone()))
        }
    }
}

/// Derive a `TriggerSpec` the way `createTrigger` does (§4.2): prefer the
/// server's cron expression if it parses, else fall back to its own period
/// or the supplied global default.
pub fn trigger_spec_for(server: &Server, global_run_period_secs: u64) -> TriggerSpec {
    if let Some(expr) = &server.cron_expression {
        if expr.parse::<cron::Schedule>().is_ok() {
            return TriggerSpec::Cron(expr.clone());
        }
        tracing::warn!(
            server = %server.identity(),
            cron = %expr,
            "invalid cron expression, falling back to interval"
        );
    }
    TriggerSpec::IntervalSeconds(server.run_period_seconds.unwrap_or(global_run_period_secs))
}
