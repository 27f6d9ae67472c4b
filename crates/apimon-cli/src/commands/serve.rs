//! Implementation of the `apimon serve` command.
//!
//! Runs the HTTP ingestion/management API with the scheduler alongside it in
//! the same process — `apimon-server`'s own binary does the same thing;
//! this just exposes it as a CLI subcommand for users who'd rather have one
//! entry point for everything.

use std::sync::Arc;

use apimon_core::clock::SystemClock;
use apimon_core::config::Config;
use apimon_core::scheduler::runtime::{wait_for_shutdown_signal, Runtime};
use apimon_core::scheduler::Scheduler;
use apimon_core::store;
use apimon_server::state::AppState;

use super::ServeArgs;

/// Execute the `apimon serve` command.
pub async fn execute(config: &Config, args: ServeArgs) -> anyhow::Result<()> {
    let bind_host = args.host.unwrap_or_else(|| config.server.host.clone());
    let bind_port = args.port.unwrap_or(config.server.port);

    let pool = store::init_db(&config.storage.db_path).await?;

    let mut runtime = Runtime::new();
    let cancel = runtime.cancel_token();

    let scheduler = Scheduler::new(
        pool.clone(),
        Arc::new(SystemClock),
        config.scheduler.to_scheduler_config(config.storage.retention_days),
    );
    let scheduler_cancel = cancel.clone();
    runtime.spawn("scheduler", async move {
        scheduler.run_forever(scheduler_cancel).await;
    });

    let state = Arc::new(AppState {
        db: pool,
        bind_host: bind_host.clone(),
        bind_port,
        cancel: cancel.clone(),
    });
    let router = apimon_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind_host}:{bind_port}")).await?;
    tracing::info!("listening on http://{bind_host}:{bind_port}");

    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        shutdown_cancel.cancel();
    });

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        cancel.cancelled().await;
    });

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    runtime.shutdown().await;

    Ok(())
}
