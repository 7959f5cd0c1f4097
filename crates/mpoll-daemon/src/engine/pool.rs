// SPDX-License-Identifier: MIT

//! Bounded worker pool backing both the query pool and the result pool
//! (§4.3). A tokio `mpsc` channel's fixed capacity *is* the bounded queue;
//! `try_send` returning `Full` *is* the rejection policy — there is no
//! retry or buffering layered on top (§4.3, §7).
//!
//! Modeled on the corpus's semaphore/channel worker-pool shape (see
//! `other_examples/.../worker-pool-mod.rs.rs`), adapted from a
//! single-dispatcher-loop design to N fixed workers sharing one channel,
//! which is what "pool size" / "queue depth" / "active count" (§4.3 "each
//! pool exposes an observability facade") actually means here.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type PoolTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Snapshot of one pool's observability facade (§4.3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub pool_size: usize,
    pub queue_capacity: usize,
    pub queue_depth: usize,
    pub active: usize,
    pub rejected_total: u64,
}

/// A bounded pool of worker tasks draining a bounded queue.
pub struct BoundedPool {
    name: String,
    sender: mpsc::Sender<PoolTask>,
    queue_capacity: usize,
    pool_size: usize,
    active: Arc<AtomicUsize>,
    rejected: Arc<AtomicU64>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl BoundedPool {
    pub fn new(name: impl Into<String>, pool_size: usize, queue_capacity: usize) -> Self {
        let name = name.into();
        let pool_size = pool_size.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = mpsc::channel::<PoolTask>(queue_capacity);
        let rx = Arc::new(AsyncMutex::new(rx));
        let active = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        let mut workers = Vec::with_capacity(pool_size);
        for worker_id in 0..pool_size {
            let rx = Arc::clone(&rx);
            let active = Arc::clone(&active);
            let cancel = cancel.clone();
            let pool_name = name.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let next = {
                        let mut guard = rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => None,
                            item = guard.recv() => item,
                        }
                    };
                    match next {
                        Some(task) => {
                            active.fetch_add(1, Ordering::SeqCst);
                            task.await;
                            active.fetch_sub(1, Ordering::SeqCst);
                        }
                        None => {
                            tracing::debug!(pool = %pool_name, worker_id, "pool worker exiting");
                            break;
                        }
                    }
                }
            }));
        }

        Self { name, sender: tx, queue_capacity, pool_size, active, rejected, cancel, workers }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submit a task. Returns `false` (and records a rejection) if the
    /// bounded queue is already full.
    pub fn try_submit<F>(&self, fut: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.sender.try_send(Box::pin(fut)) {
            Ok(()) => true,
            Err(_) => {
                self.rejected.fetch_add(1, Ordering::SeqCst);
                tracing::error!(pool = %self.name, "pool queue full, rejecting task");
                false
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        let remaining = self.sender.capacity();
        PoolStats {
            pool_size: self.pool_size,
            queue_capacity: self.queue_capacity,
            queue_depth: self.queue_capacity.saturating_sub(remaining),
            active: self.active.load(Ordering::SeqCst),
            rejected_total: self.rejected.load(Ordering::SeqCst),
        }
    }

    /// Graceful shutdown: in-flight tasks run to completion, queued but
    /// unstarted tasks are dropped (§5 cancellation semantics). Awaits every
    /// worker up to `timeout`.
    pub async fn shutdown(mut self, timeout: Duration) {
        self.cancel.cancel();
        drop(self.sender);
        let deadline = tokio::time::Instant::now() + timeout;
        for handle in self.workers.drain(..) {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, handle).await.is_err() {
                tracing::warn!(pool = %self.name, "pool worker did not stop within shutdown timeout");
            }
        }
    }
}
