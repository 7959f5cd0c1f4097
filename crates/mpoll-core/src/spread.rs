// SPDX-License-Identifier: MIT

//! Start-time spreading (§4.6).
//!
//! `compute_spread_start` returns `now + U[0, period_secs * 1000)` ms so
//! thousands of jobs scheduled simultaneously at reload don't all tick in
//! lockstep against the network.

use std::time::{Duration, Instant};

use rand::Rng;

/// Returns a uniform random delay in `[0, period_secs * 1000)` milliseconds.
pub fn spread_delay(period_secs: u64) -> Duration {
    let upper_ms = period_secs.saturating_mul(1000);
    if upper_ms == 0 {
        return Duration::ZERO;
    }
    let ms = rand::thread_rng().gen_range(0..upper_ms);
    Duration::from_millis(ms)
}

/// Returns `now + spread_delay(period_secs)`.
pub fn compute_spread_start(now: Instant, period_secs: u64) -> Instant {
    now + spread_delay(period_secs)
}
