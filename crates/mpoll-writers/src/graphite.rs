// SPDX-License-Identifier: MIT

//! Graphite plaintext protocol writer — the "graphing backend" sink named
//! in §1. Protocol: one line per metric, `<path> <value> <unix_seconds>\n`.

use async_trait::async_trait;
use mpoll_core::{AttributeValue, OutputWriter, Query, QueryResult, Server, WriterError};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

pub struct GraphiteWriter {
    name: String,
    addr: String,
    prefix: String,
    stream: Mutex<Option<TcpStream>>,
}

impl GraphiteWriter {
    pub fn new(name: impl Into<String>, addr: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            prefix: prefix.into(),
            stream: Mutex::new(None),
        }
    }

    fn metric_path(&self, server: &Server, query: &Query, attribute: &str) -> String {
        let sanitize = |s: &str| s.replace(['.', ' ', ':'], "_");
        format!(
            "{}.{}.{}.{}",
            self.prefix,
            sanitize(server.display_name()),
            sanitize(&query.object_name),
            sanitize(attribute)
        )
    }
}

#[async_trait]
impl OutputWriter for GraphiteWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), WriterError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| WriterError::Io(self.name.clone(), e))?;
        *self.stream.lock().await = Some(stream);
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
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or_else(|| WriterError::NotStarted(self.name.clone()))?;

        let mut batch = String::new();
        for result in results {
            let epoch_secs = result.timestamp_ms / 1000;
            for (attr, value) in &result.values {
                // Graphite only carries numeric series; non-numeric
                // attributes are silently dropped here, not an error.
                let numeric = match value {
                    AttributeValue::Number(n) => Some(*n),
                    AttributeValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                    AttributeValue::Text(_) => None,
                };
                if let Some(n) = numeric {
                    batch.push_str(&self.metric_path(server, query, attr));
                    batch.push(' ');
                    batch.push_str(&n.to_string());
                    batch.push(' ');
                    batch.push_str(&epoch_secs.to_string());
                    batch.push('\n');
                }
            }
        }
        if !batch.is_empty() {
            stream
                .write_all(batch.as_bytes())
                .await
                .map_err(|e| WriterError::Io(self.name.clone(), e))?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), WriterError> {
        *self.stream.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpoll_core::Credentials;
    use std::collections::BTreeMap;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn writes_numeric_attributes_as_graphite_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accepted = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = sock.read(&mut buf).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let writer = GraphiteWriter::new("g1", format!("127.0.0.1:{port}"), "mpoll");
        writer.start().await.unwrap();

        let server = Server {
            host: "h1".into(),
            port: 9999,
            alias: None,
            credentials: Credentials::default(),
            cron_expression: None,
            run_period_seconds: Some(60),
            queries: vec![],
            writers: vec![],
        };
        let query = Query {
            object_name: "java.lang:type=Memory".into(),
            attributes: vec!["Heap".into()],
            key_tags: BTreeMap::new(),
            writers: vec![],
        };
        let mut values = BTreeMap::new();
        values.insert("Heap".to_string(), AttributeValue::Number(10.0));
        values.insert("Name".to_string(), AttributeValue::Text("x".into()));
        let result =
            QueryResult { object_name: "x".into(), values, tags: BTreeMap::new(), timestamp_ms: 5000 };

        writer.write(&server, &query, &[result]).await.unwrap();
        writer.close().await.unwrap();

        let line = accepted.await.unwrap();
        assert!(line.contains("mpoll.h1.java_lang_type_Memory.Heap 10 5"));
        assert!(!line.contains("Name"));
    }
}
