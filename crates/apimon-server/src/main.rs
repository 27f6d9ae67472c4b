//! API performance monitor server binary.
//!
//! Serves the ingestion and management REST API, and — unless disabled —
//! runs the aggregation/evaluation scheduler in-process so a single binary
//! is enough for small deployments.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use apimon_core::clock::SystemClock;
use apimon_core::config::Config;
use apimon_core::scheduler::runtime::Runtime;
use apimon_core::scheduler::Scheduler;
use apimon_core::store;

use apimon_server::state::AppState;

/// API performance monitor server — serves the ingestion and management API.
#[derive(Parser)]
#[command(name = "apimon-server", version, about)]
struct Cli {
    /// Port to listen on. Overrides the config file's `server.port`.
    #[arg(long)]
    port: Option<u16>,

    /// Host address to bind to. Overrides the config file's `server.host`.
    #[arg(long)]
    host: Option<String>,

    /// Path to the configuration file.
    #[arg(long)]
    config: Option<String>,

    /// Don't run the scheduler in-process; serve the API only.
    #[arg(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_and_validate(cli.config.as_deref()).map_err(|errors| {
        let joined = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        anyhow::anyhow!("invalid configuration: {joined}")
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.clone())),
        )
        .init();

    let bind_host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let bind_port = cli.port.unwrap_or(config.server.port);

    tracing::info!(
        db = %config.storage.db_path,
        host = %bind_host,
        port = bind_port,
        "starting apimon server"
    );

    let pool = store::init_db(&config.storage.db_path).await?;

    let mut runtime = Runtime::new();
    let cancel = runtime.cancel_token();

    if !cli.no_scheduler {
        let scheduler = Scheduler::new(
            pool.clone(),
            Arc::new(SystemClock),
            config.scheduler.to_scheduler_config(config.storage.retention_days),
        );
        let scheduler_cancel = cancel.clone();
        runtime.spawn("scheduler", async move {
            scheduler.run_forever(scheduler_cancel).await;
        });
    } else {
        tracing::info!("scheduler disabled (--no-scheduler); serving API only");
    }

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
        apimon_core::scheduler::runtime::wait_for_shutdown_signal().await;
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
