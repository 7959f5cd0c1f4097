// SPDX-License-Identifier: MIT

//! Domain records shared by every crate in the workspace (§3 DATA MODEL).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Credentials used by the (external) management-protocol client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// A single attribute value returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// One batch of attribute values read from one object name on one server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub object_name: String,
    pub values: BTreeMap<String, AttributeValue>,
    pub tags: BTreeMap<String, String>,
    pub timestamp_ms: u64,
}

/// Errors an [`OutputWriter`] can report.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("writer {0} not started")]
    NotStarted(String),
    #[error("writer {0} rejected (server={1}, query={2}): {3}")]
    ValidationFailed(String, String, String, String),
    #[error("writer {0} io error: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("writer {0} error: {1}")]
    Other(String, String),
}

/// Opaque sink adapter. Every sink variant (file, graphite, in-memory, ...)
/// implements this one capability set so the engine can treat them
/// uniformly (§9 "uniform polymorphism for writers").
#[async_trait]
pub trait OutputWriter: Send + Sync {
    /// Stable name used in logs and observability labels.
    fn name(&self) -> &str;

    /// Acquire any resources needed before the first `write`. Called once
    /// per writer instance; writers are never reused across reloads.
    async fn start(&self) -> Result<(), WriterError>;

    /// Validate that this writer can accept samples for `(server, query)`.
    /// A rejection here is fatal for the reload that introduced it (§7).
    async fn validate_setup(&self, server: &Server, query: &Query) -> Result<(), WriterError>;

    /// Forward one batch of results. Implementations must be safe to call
    /// concurrently: the engine does not serialize calls to the same writer
    /// (§5 ordering guarantees).
    async fn write(
        &self,
        server: &Server,
        query: &Query,
        results: &[QueryResult],
    ) -> Result<(), WriterError>;

    /// Release resources. Called exactly once per writer instance.
    async fn close(&self) -> Result<(), WriterError>;
}

/// A named attribute-extraction request addressed to a server.
#[derive(Clone)]
pub struct Query {
    pub object_name: String,
    pub attributes: Vec<String>,
    pub key_tags: BTreeMap<String, String>,
    pub writers: Vec<Arc<dyn OutputWriter>>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("object_name", &self.object_name)
            .field("attributes", &self.attributes)
            .field("key_tags", &self.key_tags)
            .field("writers", &self.writers.iter().map(|w| w.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Either a cron expression or a fixed interval, derived from a `Server` at
/// scheduling time (§3, §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerSpec {
    Cron(String),
    IntervalSeconds(u64),
}

/// A configured target managed process to poll (§3).
#[derive(Clone)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub alias: Option<String>,
    pub credentials: Credentials,
    pub cron_expression: Option<String>,
    pub run_period_seconds: Option<u64>,
    pub queries: Vec<Query>,
    pub writers: Vec<Arc<dyn OutputWriter>>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("alias", &self.alias)
            .field("cron_expression", &self.cron_expression)
            .field("run_period_seconds", &self.run_period_seconds)
            .field("queries", &self.queries)
            .field("writers", &self.writers.iter().map(|w| w.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Server {
    /// Stable identity used as the `ExecutorRepository` key and as the
    /// prefix of every `JobKey`/trigger name this server produces.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.host)
    }

    /// All writers reachable from this server: its own plus every query's,
    /// deduplicated by instance identity (a writer may be declared at both
    /// the server and query level; §4.3 calls for "the union").
    pub fn all_writers(&self) -> Vec<Arc<dyn OutputWriter>> {
        let mut out: Vec<Arc<dyn OutputWriter>> = Vec::new();
        let mut push_unique = |w: &Arc<dyn OutputWriter>| {
            if !out.iter().any(|existing| Arc::ptr_eq(existing, w)) {
                out.push(Arc::clone(w));
            }
        };
        for w in &self.writers {
            push_unique(w);
        }
        for q in &self.queries {
            for w in &q.writers {
                push_unique(w);
            }
        }
        out
    }

    /// Writers that apply to one specific query: server-level ∪ query-level,
    /// deduplicated by instance identity (§4.3 step 4).
    pub fn writers_for(&self, query: &Query) -> Vec<Arc<dyn OutputWriter>> {
        let mut out: Vec<Arc<dyn OutputWriter>> = self.writers.clone();
        for w in &query.writers {
            if !out.iter().any(|existing| Arc::ptr_eq(existing, w)) {
                out.push(Arc::clone(w));
            }
        }
        out
    }
}
