// SPDX-License-Identifier: MIT

//! Config Watcher (§4.4): reloads when the configured file/directory
//! changes on disk.
//!
//! Two concerns share one debounce timer: giving an in-progress write time
//! to finish (reading a config file mid-write is indistinguishable from a
//! malformed one) and coalescing a burst of events (an editor's save is
//! often a temp-file write plus a rename) into one reload. Both are solved
//! by the same rule: on a relevant event, wait a quiet second with no
//! further relevant events before firing, restarting the wait whenever a
//! new relevant event arrives.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DEBOUNCE: Duration = Duration::from_secs(1);

/// Watches `path` (a file or a directory) and calls `on_reload` after a
/// quiet second following any relevant filesystem event. `path` need not
/// exist yet — its parent directory is watched instead so a later `create`
/// is still observed (§4.4 "nonexistent paths are allowed").
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ConfigWatcher {
    pub fn watch<F>(path: &Path, mut on_reload: F) -> Result<Self, notify::Error>
    where
        F: FnMut() + Send + 'static,
    {
        let watch_path = path.to_path_buf();
        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;

        let target = if watch_path.exists() {
            watch_path.clone()
        } else {
            watch_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        };
        watcher.watch(&target, RecursiveMode::NonRecursive)?;

        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();
        let filter_path = watch_path.clone();

        let handle = tokio::spawn(async move {
            loop {
                let first = tokio::select! {
                    biased;
                    _ = cancel_task.cancelled() => return,
                    maybe = rx.recv() => maybe,
                };
                let Some(res) = first else { return };
                if !matches!(res, Ok(ref e) if event_is_relevant(e, &filter_path)) {
                    continue;
                }

                if !settle(&mut rx, &cancel_task, &filter_path).await {
                    return;
                }
                on_reload();
            }
        });

        Ok(Self { _watcher: watcher, cancel, handle })
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// Waits for a quiet `DEBOUNCE` window, restarting the wait on every
/// further relevant event. Returns `false` if cancelled or the channel
/// closed while settling.
async fn settle(
    rx: &mut mpsc::UnboundedReceiver<notify::Result<Event>>,
    cancel: &CancellationToken,
    filter_path: &Path,
) -> bool {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(DEBOUNCE) => return true,
            maybe = rx.recv() => match maybe {
                None => return false,
                Some(Ok(e)) if event_is_relevant(&e, filter_path) => continue,
                Some(_) => continue,
            },
        }
    }
}

fn event_is_relevant(event: &Event, watch_path: &Path) -> bool {
    event.paths.iter().any(|p| {
        if p == watch_path {
            return true;
        }
        if watch_path.is_dir() {
            return mpoll_config::is_process_config_file(p);
        }
        !watch_path.exists() && p.file_name() == watch_path.file_name()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn modifying_a_watched_file_triggers_one_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("servers.json");
        fs::write(&file, "[]").unwrap();

        let reloads = Arc::new(AtomicUsize::new(0));
        let reloads2 = Arc::clone(&reloads);
        let watcher = ConfigWatcher::watch(&file, move || {
            reloads2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&file, "[{}]").unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(reloads.load(Ordering::SeqCst) >= 1);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn a_burst_of_writes_coalesces_into_one_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("servers.json");
        fs::write(&file, "[]").unwrap();

        let reloads = Arc::new(AtomicUsize::new(0));
        let reloads2 = Arc::clone(&reloads);
        let watcher = ConfigWatcher::watch(&file, move || {
            reloads2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        for i in 0..5 {
            fs::write(&file, format!("[{i}]")).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(reloads.load(Ordering::SeqCst), 1);
        watcher.stop().await;
    }
}
