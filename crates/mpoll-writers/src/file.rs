// SPDX-License-Identifier: MIT

//! Line-delimited JSON file writer — the "log file" sink named in §1.

use std::path::PathBuf;

use async_trait::async_trait;
use mpoll_core::{OutputWriter, Query, QueryResult, Server, WriterError};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Serialize)]
struct Line<'a> {
    server: String,
    query: &'a str,
    timestamp_ms: u64,
    values: &'a std::collections::BTreeMap<String, mpoll_core::AttributeValue>,
    tags: &'a std::collections::BTreeMap<String, String>,
}

pub struct JsonLineFileWriter {
    name: String,
    path: PathBuf,
    handle: Mutex<Option<tokio::fs::File>>,
}

impl JsonLineFileWriter {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), path: path.into(), handle: Mutex::new(None) }
    }
}

#[async_trait]
impl OutputWriter for JsonLineFileWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), WriterError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WriterError::Io(self.name.clone(), e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| WriterError::Io(self.name.clone(), e))?;
        *self.handle.lock().await = Some(file);
        Ok(())
    }

    async fn validate_setup(&self, _server: &Server, _query: &Query) -> Result<(), WriterError> {
        Ok(())
    }

    async fn write(
        &self,
        server: &Server,
        query: &Query,
        results: &[QueryResult],
    ) -> Result<(), WriterError> {
        let mut guard = self.handle.lock().await;
        let file = guard.as_mut().ok_or_else(|| WriterError::NotStarted(self.name.clone()))?;
        for result in results {
            let line = Line {
                server: server.identity(),
                query: &query.object_name,
                timestamp_ms: result.timestamp_ms,
                values: &result.values,
                tags: &result.tags,
            };
            let mut json = serde_json::to_string(&line)
                .map_err(|e| WriterError::Other(self.name.clone(), e.to_string()))?;
            json.push('\n');
            file.write_all(json.as_bytes())
                .await
                .map_err(|e| WriterError::Io(self.name.clone(), e))?;
        }
        file.flush().await.map_err(|e| WriterError::Io(self.name.clone(), e))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), WriterError> {
        *self.handle.lock().await = None;
        Ok(())
    }
}
