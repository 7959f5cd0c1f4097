// SPDX-License-Identifier: MIT

//! Job and trigger identity.
//!
//! `JobKey` carries a per-process monotonic component so that no two jobs
//! scheduled within one process run ever collide (§3 invariant, P2). The
//! original system's trigger names only carried a nanosecond timestamp and
//! were observed to collide under rapid scheduling (§9); here trigger names
//! reuse the exact same monotonic-plus-random scheme as job keys.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NONCE: AtomicU64 = AtomicU64::new(0);

fn next_nonce() -> u64 {
    NONCE.fetch_add(1, Ordering::Relaxed)
}

/// Unique identity for a scheduled job: `host:port-<nonce>-<random>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey(String);

impl JobKey {
    /// Mint a new job key for the given host:port pair.
    pub fn new(host: &str, port: u16) -> Self {
        let nonce = next_nonce();
        let suffix = nanoid::nanoid!(8);
        Self(format!("{host}:{port}-{nonce}-{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identity for a scheduler trigger. Shares `JobKey`'s collision
/// resistance rather than the original `System.nanoTime()`-only scheme.
pub type TriggerName = JobKey;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn job_keys_are_pairwise_distinct() {
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            let key = JobKey::new("h1", 9999);
            assert!(seen.insert(key), "duplicate JobKey produced");
        }
    }

    #[test]
    fn job_key_contains_host_and_port() {
        let key = JobKey::new("db1.internal", 7199);
        assert!(key.as_str().starts_with("db1.internal:7199-"));
    }
}
