// SPDX-License-Identifier: MIT

//! Server Job: the unit of work fired by one tick (§4.3).
//!
//! 1. For each `Query` on the `Server`, submit a query task to the query
//!    pool — all query tasks are submitted before the job returns.
//! 2. Each query task performs the remote fetch, then submits a result task
//!    to the result pool.
//! 3. Each result task writes to every writer in the union of server- and
//!    query-level writers, swallowing per-writer failures so one bad sink
//!    doesn't starve the others.
//!
//! No ordering is guaranteed between ticks or between queries within a
//! tick (§5).

use std::sync::Arc;

use mpoll_core::{Query, Server};
use mpoll_proto::ProtocolClient;

use super::pool::BoundedPool;

/// Fires one tick for `server`: submits one query task per configured
/// query. Never calls a writer directly — that happens only inside a result
/// task run from the result pool.
pub fn run_server_job(
    server: Arc<Server>,
    proto: Arc<dyn ProtocolClient>,
    query_pool: Arc<BoundedPool>,
    result_pool: Arc<BoundedPool>,
) {
    for query in server.queries.clone() {
        let query = Arc::new(query);
        let server = Arc::clone(&server);
        let proto = Arc::clone(&proto);
        let result_pool = Arc::clone(&result_pool);
        let server_for_log = Arc::clone(&server);
        let query_for_log = Arc::clone(&query);

        let submitted = query_pool.try_submit(async move {
            run_query_task(server, query, proto, result_pool).await;
        });

        if !submitted {
            tracing::error!(
                server = %server_for_log.identity(),
                query = %query_for_log.object_name,
                "query pool queue full, dropping this tick for this query"
            );
        }
    }
}

async fn run_query_task(
    server: Arc<Server>,
    query: Arc<Query>,
    proto: Arc<dyn ProtocolClient>,
    result_pool: Arc<BoundedPool>,
) {
    let outcome = proto.query(&server, &query).await;
    let results = match outcome {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(
                server = %server.identity(),
                query = %query.object_name,
                error = %e,
                "query failed"
            );
            return;
        }
    };

    let server_for_log = Arc::clone(&server);
    let query_for_log = Arc::clone(&query);
    let submitted = result_pool.try_submit(async move {
        run_result_task(server, query, results).await;
    });

    if !submitted {
        tracing::error!(
            server = %server_for_log.identity(),
            query = %query_for_log.object_name,
            "result pool queue full, dropping this tick's results"
        );
    }
}

async fn run_result_task(
    server: Arc<Server>,
    query: Arc<Query>,
    results: Vec<mpoll_core::QueryResult>,
) {
    for writer in server.writers_for(&query) {
        if let Err(e) = writer.write(&server, &query, &results).await {
            tracing::error!(
                server = %server.identity(),
                query = %query.object_name,
                writer = writer.name(),
                error = %e,
                "writer failed, continuing with remaining writers"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpoll_core::{AttributeValue, Credentials, OutputWriter, QueryResult};
    use mpoll_proto::ProtoError;
    use mpoll_writers::MemoryWriter;
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct StubClient {
        attr_value: f64,
    }

    #[async_trait::async_trait]
    impl ProtocolClient for StubClient {
        async fn query(
            &self,
            _server: &Server,
            query: &Query,
        ) -> Result<Vec<QueryResult>, ProtoError> {
            let mut values = BTreeMap::new();
            values.insert("Heap".to_string(), AttributeValue::Number(self.attr_value));
            Ok(vec![QueryResult {
                object_name: query.object_name.clone(),
                values,
                tags: BTreeMap::new(),
                timestamp_ms: 0,
            }])
        }
    }

    #[tokio::test]
    async fn one_tick_writes_to_every_writer_in_the_union() {
        let server_writer = MemoryWriter::new("server-writer");
        let query_writer = MemoryWriter::new("query-writer");
        server_writer.start().await.unwrap();
        query_writer.start().await.unwrap();

        let query = Query {
            object_name: "java.lang:type=Memory".into(),
            attributes: vec!["Heap".into()],
            key_tags: BTreeMap::new(),
            writers: vec![Arc::new(query_writer.clone())],
        };
        let server = Arc::new(Server {
            host: "h1".into(),
            port: 9999,
            alias: None,
            credentials: Credentials::default(),
            cron_expression: None,
            run_period_seconds: Some(60),
            queries: vec![query],
            writers: vec![Arc::new(server_writer.clone())],
        });

        let proto: Arc<dyn ProtocolClient> = Arc::new(StubClient { attr_value: 7.0 });
        let query_pool = Arc::new(BoundedPool::new("q", 2, 8));
        let result_pool = Arc::new(BoundedPool::new("r", 2, 8));

        run_server_job(Arc::clone(&server), proto, Arc::clone(&query_pool), Arc::clone(&result_pool));

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(server_writer.write_count(), 1);
        assert_eq!(query_writer.write_count(), 1);

        Arc::try_unwrap(query_pool).ok().unwrap().shutdown(Duration::from_secs(1)).await;
        Arc::try_unwrap(result_pool).ok().unwrap().shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn a_failing_writer_does_not_stop_the_others() {
        let good = MemoryWriter::new("good");
        let bad = MemoryWriter::new("bad"); // never started -> write() fails
        good.start().await.unwrap();

        let query = Query {
            object_name: "o".into(),
            attributes: vec!["Heap".into()],
            key_tags: BTreeMap::new(),
            writers: vec![],
        };
        let server = Arc::new(Server {
            host: "h1".into(),
            port: 1,
            alias: None,
            credentials: Credentials::default(),
            cron_expression: None,
            run_period_seconds: Some(60),
            queries: vec![query],
            writers: vec![Arc::new(bad.clone()), Arc::new(good.clone())],
        });

        let proto: Arc<dyn ProtocolClient> = Arc::new(StubClient { attr_value: 1.0 });
        let query_pool = Arc::new(BoundedPool::new("q", 1, 4));
        let result_pool = Arc::new(BoundedPool::new("r", 1, 4));
        run_server_job(Arc::clone(&server), proto, Arc::clone(&query_pool), Arc::clone(&result_pool));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(good.write_count(), 1);
        assert_eq!(bad.write_count(), 0);

        Arc::try_unwrap(query_pool).ok().unwrap().shutdown(Duration::from_secs(1)).await;
        Arc::try_unwrap(result_pool).ok().unwrap().shutdown(Duration::from_secs(1)).await;
    }
}
