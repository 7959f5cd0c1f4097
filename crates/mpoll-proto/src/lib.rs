// SPDX-License-Identifier: MIT

//! The management-protocol client (§1: "out of scope... described only
//! through the interfaces the core consumes").
//!
//! The engine only ever calls [`ProtocolClient::query`]; this crate supplies
//! one concrete implementation — a small line-based TCP protocol — so the
//! engine is exercised by real I/O in integration tests rather than only
//! by mocks. Swapping this out for a real management-bean client (e.g. an
//! RMI/JMX bridge) would mean adding another `ProtocolClient` impl, not
//! touching the engine.

mod wire;

use std::time::Duration;

use async_trait::async_trait;
use mpoll_core::{Query, QueryResult, Server};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub use wire::WireReply;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("connect to {0} failed: {1}")]
    Connect(String, #[source] std::io::Error),
    #[error("request to {0} failed: {1}")]
    Request(String, #[source] std::io::Error),
    #[error("response from {0} timed out")]
    Timeout(String),
    #[error("response from {0} was not valid: {1}")]
    BadResponse(String, String),
}

/// Performs one remote attribute fetch against one `Server`/`Query` pair.
///
/// Implementations are invoked from inside the query pool (§4.3); they must
/// be safe to call from many concurrent tasks.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn query(&self, server: &Server, query: &Query) -> Result<Vec<QueryResult>, ProtoError>;
}

/// Line-based TCP client: writes `GET <objectName> <attr,attr,...>\n`,
/// reads one newline-terminated JSON reply.
pub struct TcpProtocolClient {
    request_timeout: Duration,
}

impl TcpProtocolClient {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for TcpProtocolClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl ProtocolClient for TcpProtocolClient {
    async fn query(&self, server: &Server, query: &Query) -> Result<Vec<QueryResult>, ProtoError> {
        let addr = server.identity();
        let fut = self.run_query(&addr, query);
        match timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProtoError::Timeout(addr)),
        }
    }
}

impl TcpProtocolClient {
    async fn run_query(
        &self,
        addr: &str,
        query: &Query,
    ) -> Result<Vec<QueryResult>, ProtoError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ProtoError::Connect(addr.to_string(), e))?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let request = wire::encode_request(query);
        write_half
            .write_all(request.as_bytes())
            .await
            .map_err(|e| ProtoError::Request(addr.to_string(), e))?;

        let mut line = String::new();
        reader
            .read_line(&mut line)
            .await
            .map_err(|e| ProtoError::Request(addr.to_string(), e))?;

        wire::decode_reply(&line, query)
            .map_err(|e| ProtoError::BadResponse(addr.to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpoll_core::Credentials;
    use std::collections::BTreeMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sample_query() -> Query {
        Query {
            object_name: "java.lang:type=Memory".into(),
            attributes: vec!["HeapMemoryUsage".into()],
            key_tags: BTreeMap::new(),
            writers: vec![],
        }
    }

    fn sample_server(port: u16) -> Server {
        Server {
            host: "127.0.0.1".into(),
            port,
            alias: None,
            credentials: Credentials::default(),
            cron_expression: None,
            run_period_seconds: Some(60),
            queries: vec![],
            writers: vec![],
        }
    }

    #[tokio::test]
    async fn query_roundtrips_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 256];
            let n = sock.read(&mut buf).await.unwrap();
            assert!(String::from_utf8_lossy(&buf[..n]).starts_with("GET "));
            let reply = r#"{"values":{"HeapMemoryUsage":42.0}}"#;
            sock.write_all(format!("{reply}\n").as_bytes()).await.unwrap();
        });

        let client = TcpProtocolClient::new(Duration::from_secs(2));
        let results = client.query(&sample_server(port), &sample_query()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].object_name, "java.lang:type=Memory");
    }

    #[tokio::test]
    async fn query_times_out_against_a_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            // never reply
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = TcpProtocolClient::new(Duration::from_millis(50));
        let err = client.query(&sample_server(port), &sample_query()).await.unwrap_err();
        assert!(matches!(err, ProtoError::Timeout(_)));
    }
}
