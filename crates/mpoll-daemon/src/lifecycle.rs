// SPDX-License-Identifier: MIT

//! Lifecycle Controller (§4.1, §4.5): owns the single state machine that
//! takes the daemon from `Stopped` through `Running` and back, and performs
//! atomic config reloads in between.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mpoll_core::Clock;
use mpoll_proto::ProtocolClient;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::engine::{run_server_job, BoundedPool, ExecutorRepository};
use crate::error::LifecycleError;
use crate::watcher::ConfigWatcher;

/// Delay observed between the last write landing and process exit, so a
/// writer's buffered I/O (e.g. a just-opened TCP socket flush) has a chance
/// to complete before the process disappears (§9).
pub const SHUTDOWN_SETTLE: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Stopped,
    Starting,
    Running,
    Stopping,
}

pub struct LifecycleConfig {
    pub config_path: PathBuf,
    pub continue_on_error: bool,
    pub global_run_period_seconds: u64,
    pub pool_size: usize,
    pub queue_capacity: usize,
    pub pool_shutdown_timeout: Duration,
}

struct Inner {
    state: State,
    config: LifecycleConfig,
    clock: Arc<dyn Clock>,
    proto: Arc<dyn ProtocolClient>,
    repository: Option<ExecutorRepository>,
    watcher: Option<ConfigWatcher>,
    reload_driver: Option<tokio::task::JoinHandle<()>>,
}

/// Start → Running → Stop, with Reload available only while Running
/// (§4.1). All transitions go through one async mutex so concurrent
/// start/stop/reload calls (a signal handler racing the config watcher,
/// say) serialize rather than interleave.
pub struct LifecycleController {
    inner: AsyncMutex<Inner>,
}

impl LifecycleController {
    pub fn new(
        config: LifecycleConfig,
        clock: Arc<dyn Clock>,
        proto: Arc<dyn ProtocolClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: AsyncMutex::new(Inner {
                state: State::Stopped,
                config,
                clock,
                proto,
                repository: None,
                watcher: None,
                reload_driver: None,
            }),
        })
    }

    /// Startup order (§4.1): load config, build the repository and register
    /// every server (spreads + triggers start firing immediately), then
    /// arm the config watcher last so a reload can never race a
    /// still-in-progress first start.
    pub async fn start(self: &Arc<Self>) -> Result<usize, LifecycleError> {
        let mut inner = self.inner.lock().await;
        if inner.state != State::Stopped {
            return Err(LifecycleError::AlreadyRunning);
        }
        inner.state = State::Starting;
        tracing::info!("lifecycle starting");

        let repo = load_repository(&inner).await?;
        let count = repo.len();
        inner.repository = Some(repo);

        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let watcher = ConfigWatcher::watch(&inner.config.config_path, move || {
            let _ = tx.send(());
        })
        .map_err(LifecycleError::Watch)?;
        inner.watcher = Some(watcher);

        let weak_self = Arc::downgrade(self);
        inner.reload_driver = Some(tokio::spawn(drive_reloads(weak_self, rx)));

        inner.state = State::Running;
        tracing::info!(servers = count, "lifecycle running");
        Ok(count)
    }

    /// Atomic reload (§4.5): parse the config fresh; on success, tear down
    /// every currently-managed server and register the new set. A parse
    /// failure leaves the previously-running set untouched and is reported,
    /// not fatal, unless `continue_on_error` is false and the failure is a
    /// hard parse error (see `mpoll_config::parse_servers`).
    pub async fn reload(&self) -> Result<usize, LifecycleError> {
        let mut inner = self.inner.lock().await;
        if inner.state != State::Running {
            return Err(LifecycleError::NotRunning);
        }
        tracing::info!("reload starting");

        let new_repo = match load_repository(&inner).await {
            Ok(repo) => repo,
            Err(e) => {
                tracing::error!(error = %e, "reload aborted, previous configuration stays running");
                return Err(e);
            }
        };
        let count = new_repo.len();

        if let Some(mut old) = inner.repository.take() {
            old.clear().await;
        }
        inner.repository = Some(new_repo);

        tracing::info!(servers = count, "reload complete");
        Ok(count)
    }

    /// Shutdown order (§4.1): disarm the watcher first so no reload can fire
    /// mid-shutdown, then stop every managed server.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let mut inner = self.inner.lock().await;
        if inner.state != State::Running {
            return Err(LifecycleError::NotRunning);
        }
        inner.state = State::Stopping;
        tracing::info!("lifecycle stopping");

        if let Some(watcher) = inner.watcher.take() {
            watcher.stop().await;
        }
        if let Some(driver) = inner.reload_driver.take() {
            driver.abort();
        }
        if let Some(mut repo) = inner.repository.take() {
            repo.clear().await;
        }

        inner.state = State::Stopped;
        tracing::info!("lifecycle stopped");
        Ok(())
    }

    pub async fn server_count(&self) -> usize {
        self.inner.lock().await.repository.as_ref().map_or(0, ExecutorRepository::len)
    }
}

async fn load_repository(inner: &Inner) -> Result<ExecutorRepository, LifecycleError> {
    let servers = mpoll_config::parse_servers(&inner.config.config_path, inner.config.continue_on_error)?;
    let mut repo = ExecutorRepository::new(
        Arc::clone(&inner.clock),
        Arc::clone(&inner.proto),
        inner.config.pool_size,
        inner.config.queue_capacity,
        inner.config.pool_shutdown_timeout,
    );
    for server in servers {
        if let Err(e) = repo.register(server, inner.config.global_run_period_seconds).await {
            // Fatal for this reload (§7): close whatever this build already
            // started rather than leave it running unreachable.
            repo.clear().await;
            return Err(LifecycleError::WriterSetup(e));
        }
    }
    Ok(repo)
}

async fn drive_reloads(controller: std::sync::Weak<LifecycleController>, mut rx: mpsc::UnboundedReceiver<()>) {
    while rx.recv().await.is_some() {
        let Some(controller) = controller.upgrade() else { return };
        if let Err(e) = controller.reload().await {
            tracing::error!(error = %e, "watcher-triggered reload failed");
        }
    }
}

async fn close_started(writers: &[Arc<dyn mpoll_core::OutputWriter>]) {
    for writer in writers {
        if let Err(e) = writer.close().await {
            tracing::error!(writer = writer.name(), error = %e, "writer close failed");
        }
    }
}

/// One-shot mode (§4.2 `--once` / `runStandalone`): fires every configured
/// server exactly once, with no spread delay and no recurring trigger, then
/// waits for every in-flight query/result task to finish before returning.
pub async fn run_standalone(
    config_path: &Path,
    continue_on_error: bool,
    proto: Arc<dyn ProtocolClient>,
    pool_size: usize,
    queue_capacity: usize,
    drain_timeout: Duration,
) -> Result<usize, LifecycleError> {
    let servers = mpoll_config::parse_servers(config_path, continue_on_error)?;
    let count = servers.len();

    let query_pool = Arc::new(BoundedPool::new("standalone-query", pool_size, queue_capacity));
    let result_pool = Arc::new(BoundedPool::new("standalone-result", pool_size, queue_capacity));

    let mut all_writers: Vec<Arc<dyn mpoll_core::OutputWriter>> = Vec::new();
    let mut started_servers = Vec::with_capacity(servers.len());
    for server in servers {
        let server = Arc::new(server);
        for writer in server.all_writers() {
            if let Err(e) = writer.start().await {
                close_started(&all_writers).await;
                return Err(e.into());
            }
            all_writers.push(writer);
        }
        for query in &server.queries {
            for writer in server.writers_for(query) {
                if let Err(e) = writer.validate_setup(&server, query).await {
                    close_started(&all_writers).await;
                    return Err(e.into());
                }
            }
        }
        started_servers.push(server);
    }

    for server in started_servers {
        run_server_job(server, Arc::clone(&proto), Arc::clone(&query_pool), Arc::clone(&result_pool));
    }

    let deadline = tokio::time::Instant::now() + drain_timeout;
    loop {
        let q = query_pool.stats();
        let r = result_pool.stats();
        if q.active == 0 && q.queue_depth == 0 && r.active == 0 && r.queue_depth == 0 {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!("standalone run hit drain timeout with work still outstanding");
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    if let Ok(pool) = Arc::try_unwrap(query_pool) {
        pool.shutdown(Duration::from_secs(1)).await;
    }
    if let Ok(pool) = Arc::try_unwrap(result_pool) {
        pool.shutdown(Duration::from_secs(1)).await;
    }

    for writer in &all_writers {
        if let Err(e) = writer.close().await {
            tracing::error!(writer = writer.name(), error = %e, "writer close failed");
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mpoll_core::{QueryResult, SystemClock};
    use mpoll_proto::ProtoError;
    use std::collections::BTreeMap;
    use std::fs;

    struct StubClient;

    #[async_trait]
    impl ProtocolClient for StubClient {
        async fn query(
            &self,
            _server: &mpoll_core::Server,
            query: &mpoll_core::Query,
        ) -> Result<Vec<QueryResult>, ProtoError> {
            Ok(vec![QueryResult {
                object_name: query.object_name.clone(),
                values: BTreeMap::new(),
                tags: BTreeMap::new(),
                timestamp_ms: 0,
            }])
        }
    }

    fn lifecycle_config(path: PathBuf) -> LifecycleConfig {
        LifecycleConfig {
            config_path: path,
            continue_on_error: false,
            global_run_period_seconds: 60,
            pool_size: 1,
            queue_capacity: 8,
            pool_shutdown_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn start_then_stop_round_trips_through_the_state_machine() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("s.json");
        fs::write(&file, r#"[{"host":"h1","port":1,"run_period_seconds":0,"queries":[]}]"#).unwrap();

        let controller = LifecycleController::new(lifecycle_config(file), Arc::new(SystemClock), Arc::new(StubClient));
        let count = controller.start().await.unwrap();
        assert_eq!(count, 1);
        assert!(controller.start().await.is_err());

        controller.stop().await.unwrap();
        assert!(controller.stop().await.is_err());
    }

    #[tokio::test]
    async fn reload_picks_up_an_added_server() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("s.json");
        fs::write(&file, r#"[{"host":"h1","port":1,"run_period_seconds":0,"queries":[]}]"#).unwrap();

        let controller = LifecycleController::new(lifecycle_config(file.clone()), Arc::new(SystemClock), Arc::new(StubClient));
        controller.start().await.unwrap();

        fs::write(
            &file,
            r#"[{"host":"h1","port":1,"run_period_seconds":0,"queries":[]},
                {"host":"h2","port":1,"run_period_seconds":0,"queries":[]}]"#,
        )
        .unwrap();
        let count = controller.reload().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(controller.server_count().await, 2);

        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn run_standalone_fires_every_server_once_and_drains() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("s.json");
        fs::write(&file, r#"[{"host":"h1","port":1,"run_period_seconds":60,"queries":[]}]"#).unwrap();

        let count = run_standalone(&file, false, Arc::new(StubClient), 1, 8, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn run_standalone_starts_writers_so_the_one_shot_actually_writes() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("s.json");
        let out_file = dir.path().join("out.jsonl");
        fs::write(
            &config_file,
            format!(
                r#"[{{"host":"h1","port":1,"run_period_seconds":60,
                     "writers":[{{"type":"file","name":"w1","path":"{path}"}}],
                     "queries":[{{"object_name":"o","attributes":["Heap"]}}]}}]"#,
                path = out_file.display(),
            ),
        )
        .unwrap();

        run_standalone(&config_file, false, Arc::new(StubClient), 1, 8, Duration::from_secs(2))
            .await
            .unwrap();

        let written = fs::read_to_string(&out_file).unwrap();
        assert!(!written.trim().is_empty(), "writer was never started, so nothing landed in {out_file:?}");
    }
}
