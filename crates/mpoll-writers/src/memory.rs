// SPDX-License-Identifier: MIT

//! In-memory writer used by daemon/CLI integration tests (§8 scenarios all
//! assert against a mock writer's observed `write()` calls).

use std::sync::Arc;

use async_trait::async_trait;
use mpoll_core::{OutputWriter, Query, QueryResult, Server, WriterError};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub server: String,
    pub query: String,
    pub results: Vec<QueryResult>,
}

struct Inner {
    started: bool,
    closed: bool,
    close_count: u32,
    writes: Vec<RecordedWrite>,
    fail_validation: bool,
}

/// Shared, clonable writer that records every call for assertions.
#[derive(Clone)]
pub struct MemoryWriter {
    name: String,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWriter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Inner {
                started: false,
                closed: false,
                close_count: 0,
                writes: Vec::new(),
                fail_validation: false,
            })),
        }
    }

    pub fn failing_validation(name: impl Into<String>) -> Self {
        let w = Self::new(name);
        w.inner.lock().fail_validation = true;
        w
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().started
    }

    pub fn close_count(&self) -> u32 {
        self.inner.lock().close_count
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.inner.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.inner.lock().writes.len()
    }
}

#[async_trait]
impl OutputWriter for MemoryWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), WriterError> {
        let mut inner = self.inner.lock();
        inner.started = true;
        inner.closed = false;
        Ok(())
    }

    async fn validate_setup(&self, server: &Server, query: &Query) -> Result<(), WriterError> {
        if self.inner.lock().fail_validation {
            return Err(WriterError::ValidationFailed(
                self.name.clone(),
                server.identity(),
                query.object_name.clone(),
                "forced failure".to_string(),
            ));
        }
        Ok(())
    }

    async fn write(
        &self,
        server: &Server,
        query: &Query,
        results: &[QueryResult],
    ) -> Result<(), WriterError> {
        let mut inner = self.inner.lock();
        if !inner.started {
            return Err(WriterError::NotStarted(self.name.clone()));
        }
        inner.writes.push(RecordedWrite {
            server: server.identity(),
            query: query.object_name.clone(),
            results: results.to_vec(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), WriterError> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.close_count += 1;
        Ok(())
    }
}
