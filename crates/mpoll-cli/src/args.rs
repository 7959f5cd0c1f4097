// SPDX-License-Identifier: MIT

//! Command-line surface (§1, §6).

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "mpoll", about = "Polls management-bean attributes from configured servers on a schedule")]
pub struct Args {
    /// Path to a single config file or a directory of config files.
    #[arg(long = "config", value_name = "PATH")]
    pub config: PathBuf,

    /// Skip unparsable config files instead of failing the whole load.
    #[arg(long = "continue-on-error")]
    pub continue_on_error: bool,

    /// Default poll period in seconds for servers that don't set their own
    /// and don't have a cron expression.
    #[arg(long = "run-period", value_name = "SECONDS", default_value_t = 60)]
    pub run_period_seconds: u64,

    /// Worker threads per query/result pool.
    #[arg(long = "pool-size", value_name = "N", default_value_t = 4)]
    pub pool_size: usize,

    /// Bounded queue capacity per query/result pool.
    #[arg(long = "queue-capacity", value_name = "N", default_value_t = 256)]
    pub queue_capacity: usize,

    /// Accepted for compatibility with callers that pass an extra
    /// classpath-style argument; has no effect.
    #[arg(long = "additional-jars", value_name = "PATHS", hide = true)]
    pub additional_jars: Option<String>,

    /// Run every configured server exactly once and exit instead of
    /// starting the daemon.
    #[arg(long = "once")]
    pub once: bool,
}

impl Args {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    pub fn pool_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}
