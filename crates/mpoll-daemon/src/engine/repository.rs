// SPDX-License-Identifier: MIT

//! Executor Repository (§3, §4.5): maps each configured `Server`'s identity
//! to the running state backing it — its trigger and its two pools — and
//! owns the atomic swap performed on reload.

use std::collections::HashMap;
use std::sync::Arc;

use mpoll_core::{Clock, OutputWriter, Server, WriterError};
use mpoll_proto::ProtocolClient;

use super::job::run_server_job;
use super::pool::BoundedPool;
use super::scheduler::Trigger;

/// Everything running on behalf of one `Server`.
pub struct ManagedServer {
    pub server: Arc<Server>,
    trigger: Trigger,
    query_pool: Arc<BoundedPool>,
    result_pool: Arc<BoundedPool>,
    /// The deduplicated writer union for this server (§3, §4.3), started
    /// once at registration; closed once each, here, at shutdown (P4).
    writers: Vec<Arc<dyn OutputWriter>>,
}

impl ManagedServer {
    pub fn query_pool(&self) -> &BoundedPool {
        &self.query_pool
    }

    pub fn result_pool(&self) -> &BoundedPool {
        &self.result_pool
    }

    async fn shutdown(self, pool_shutdown_timeout: std::time::Duration) {
        self.trigger.stop().await;
        close_all(&self.writers).await;
        match Arc::try_unwrap(self.query_pool) {
            Ok(pool) => pool.shutdown(pool_shutdown_timeout).await,
            Err(pool) => tracing::warn!(pool = pool.name(), "query pool still referenced at shutdown"),
        }
        match Arc::try_unwrap(self.result_pool) {
            Ok(pool) => pool.shutdown(pool_shutdown_timeout).await,
            Err(pool) => tracing::warn!(pool = pool.name(), "result pool still referenced at shutdown"),
        }
    }
}

/// Calls `close()` on every writer, logging rather than propagating a
/// failure so one stuck sink doesn't stop the rest from closing.
async fn close_all(writers: &[Arc<dyn OutputWriter>]) {
    for writer in writers {
        if let Err(e) = writer.close().await {
            tracing::error!(writer = writer.name(), error = %e, "writer close failed");
        }
    }
}

/// Live registry of every `Server` currently polled, keyed by
/// `Server::identity()`.
pub struct ExecutorRepository {
    clock: Arc<dyn Clock>,
    proto: Arc<dyn ProtocolClient>,
    pool_size: usize,
    queue_capacity: usize,
    pool_shutdown_timeout: std::time::Duration,
    servers: HashMap<String, ManagedServer>,
}

impl ExecutorRepository {
    pub fn new(
        clock: Arc<dyn Clock>,
        proto: Arc<dyn ProtocolClient>,
        pool_size: usize,
        queue_capacity: usize,
        pool_shutdown_timeout: std::time::Duration,
    ) -> Self {
        Self {
            clock,
            proto,
            pool_size,
            queue_capacity,
            pool_shutdown_timeout,
            servers: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn identities(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }

    /// Start polling `server` (§4.1 startup step 6): starts every writer in
    /// the deduplicated union, validates each `(server, query, writer)`
    /// triple, then builds the two pools and spawns the trigger. A writer
    /// start or validation failure is fatal for this registration — anything
    /// already started for `server` is closed before the error is returned.
    pub async fn register(&mut self, server: Server, global_run_period_seconds: u64) -> Result<(), WriterError> {
        let identity = server.identity();
        let server = Arc::new(server);

        let writers = server.all_writers();
        let mut started: Vec<Arc<dyn OutputWriter>> = Vec::with_capacity(writers.len());
        for writer in &writers {
            if let Err(e) = writer.start().await {
                close_all(&started).await;
                return Err(e);
            }
            started.push(Arc::clone(writer));
        }

        for query in &server.queries {
            for writer in server.writers_for(query) {
                if let Err(e) = writer.validate_setup(&server, query).await {
                    close_all(&started).await;
                    return Err(e);
                }
            }
        }

        let query_pool = Arc::new(BoundedPool::new(
            format!("{identity}-query"),
            self.pool_size,
            self.queue_capacity,
        ));
        let result_pool = Arc::new(BoundedPool::new(
            format!("{identity}-result"),
            self.pool_size,
            self.queue_capacity,
        ));

        let spec = mpoll_config::trigger_spec_for(&server, global_run_period_seconds);
        let spread_period = server.run_period_seconds.unwrap_or(global_run_period_seconds);

        let server_for_fire = Arc::clone(&server);
        let proto_for_fire = Arc::clone(&self.proto);
        let query_pool_for_fire = Arc::clone(&query_pool);
        let result_pool_for_fire = Arc::clone(&result_pool);

        let trigger = Trigger::spawn(&identity, spec, spread_period, Arc::clone(&self.clock), move || {
            run_server_job(
                Arc::clone(&server_for_fire),
                Arc::clone(&proto_for_fire),
                Arc::clone(&query_pool_for_fire),
                Arc::clone(&result_pool_for_fire),
            );
        });

        self.servers.insert(
            identity,
            ManagedServer { server, trigger, query_pool, result_pool, writers },
        );
        Ok(())
    }

    /// Stop and remove `identity` if present, returning whether anything was
    /// removed.
    pub async fn unregister(&mut self, identity: &str) -> bool {
        if let Some(managed) = self.servers.remove(identity) {
            managed.shutdown(self.pool_shutdown_timeout).await;
            true
        } else {
            false
        }
    }

    /// Stop and remove every managed server (§4.1 shutdown, §4.5 reload).
    pub async fn clear(&mut self) {
        let identities: Vec<String> = self.servers.keys().cloned().collect();
        for identity in identities {
            self.unregister(&identity).await;
        }
    }
}
