// SPDX-License-Identifier: MIT

//! Trigger construction and firing loops (§4.2, §4.6).
//!
//! Every trigger — cron or interval — starts with one uniformly-distributed
//! spread delay so that a config with many servers on the same period
//! doesn't thunder all of them at once. After that first fire:
//!
//! - An interval trigger just sleeps `period` and fires again, forever.
//! - A cron trigger computes the next scheduled instant on or after "now"
//!   from the cron expression and sleeps until it, forever.
//!
//! A trigger's name reuses the `JobKey`/`TriggerName` scheme (§9) so it can
//! be correlated with the job instances it fires.

use std::str::FromStr;
use std::sync::Arc;

use cron::Schedule;
use mpoll_core::{spread_delay, Clock, TriggerName, TriggerSpec};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One running trigger: a background task that calls `on_fire` on schedule
/// until cancelled.
pub struct Trigger {
    pub name: TriggerName,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Trigger {
    /// Spawn a trigger for `spec`, sourced from `host`/`port`'s identity,
    /// using `run_period_seconds` to compute the initial spread delay.
    /// `on_fire` is called once per tick; it must not block the scheduler
    /// loop, so callers hand it work that's merely *submitted* somewhere
    /// (a pool, a channel), never run inline.
    pub fn spawn<F>(
        identity: &str,
        spec: TriggerSpec,
        spread_period_seconds: u64,
        clock: Arc<dyn Clock>,
        mut on_fire: F,
    ) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (host, port) = identity.rsplit_once(':').unwrap_or((identity, "0"));
        let name: TriggerName = TriggerName::new(host, port.parse().unwrap_or(0));
        let cancel = CancellationToken::new();
        let cancel_for_task = cancel.clone();
        let trigger_name = name.clone();

        let handle = tokio::spawn(async move {
            let spread = spread_delay(spread_period_seconds);
            tracing::debug!(trigger = %trigger_name, spread_ms = spread.as_millis(), "initial spread delay");
            if sleep_or_cancel(spread, &cancel_for_task).await.is_err() {
                return;
            }

            match spec {
                TriggerSpec::IntervalSeconds(period) => {
                    let period = std::time::Duration::from_secs(period.max(1));
                    loop {
                        on_fire();
                        if sleep_or_cancel(period, &cancel_for_task).await.is_err() {
                            return;
                        }
                    }
                }
                TriggerSpec::Cron(expr) => {
                    let schedule = match Schedule::from_str(&expr) {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::error!(trigger = %trigger_name, error = %e, "cron expression rejected at fire time");
                            return;
                        }
                    };
                    loop {
                        let now = clock.utc_now();
                        let Some(next) = schedule.after(&now).next() else {
                            tracing::error!(trigger = %trigger_name, "cron schedule has no further occurrences");
                            return;
                        };
                        let delay = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);
                        if sleep_or_cancel(delay, &cancel_for_task).await.is_err() {
                            return;
                        }
                        on_fire();
                    }
                }
            }
        });

        Self { name, cancel, handle }
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

async fn sleep_or_cancel(duration: std::time::Duration, cancel: &CancellationToken) -> Result<(), ()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(()),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpoll_core::SystemClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn interval_trigger_fires_repeatedly() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let trigger = Trigger::spawn(
            "h:1",
            TriggerSpec::IntervalSeconds(0),
            0,
            Arc::new(SystemClock),
            move || {
                count2.fetch_add(1, Ordering::SeqCst);
            },
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.stop().await;
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn stop_prevents_further_fires() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let trigger = Trigger::spawn(
            "h:1",
            TriggerSpec::IntervalSeconds(60),
            0,
            Arc::new(SystemClock),
            move || {
                count2.fetch_add(1, Ordering::SeqCst);
            },
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.stop().await;
        let seen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }
}
