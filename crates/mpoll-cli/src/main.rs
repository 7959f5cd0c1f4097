// SPDX-License-Identifier: MIT

mod args;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use mpoll_core::SystemClock;
use mpoll_daemon::{run_standalone, LifecycleConfig, LifecycleController, SHUTDOWN_SETTLE};
use mpoll_proto::TcpProtocolClient;

use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let proto = Arc::new(TcpProtocolClient::new(args.request_timeout()));

    if args.once {
        return match run_standalone(
            &args.config,
            args.continue_on_error,
            proto,
            args.pool_size,
            args.queue_capacity,
            args.pool_shutdown_timeout(),
        )
        .await
        {
            Ok(count) => {
                tracing::info!(servers = count, "standalone run complete");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "standalone run failed");
                ExitCode::FAILURE
            }
        };
    }

    let config = LifecycleConfig {
        config_path: args.config.clone(),
        continue_on_error: args.continue_on_error,
        global_run_period_seconds: args.run_period_seconds,
        pool_size: args.pool_size,
        queue_capacity: args.queue_capacity,
        pool_shutdown_timeout: args.pool_shutdown_timeout(),
    };

    let controller = LifecycleController::new(config, Arc::new(SystemClock), proto);

    if let Err(e) = controller.start().await {
        tracing::error!(error = %e, "failed to start");
        return ExitCode::FAILURE;
    }

    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install Ctrl+C handler");
    }

    tracing::info!("shutdown signal received");
    if let Err(e) = controller.stop().await {
        tracing::error!(error = %e, "shutdown failed");
        return ExitCode::FAILURE;
    }

    tokio::time::sleep(SHUTDOWN_SETTLE).await;
    ExitCode::SUCCESS
}
