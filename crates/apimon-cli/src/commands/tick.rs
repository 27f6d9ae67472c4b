//! Implementation of the `apimon tick` command.
//!
//! Runs one Aggregate+Evaluate cycle and, if due, the retention cleanup job,
//! then exits. Designed for integration with external schedulers (cron,
//! systemd timers) as an alternative to running `apimon-server`'s in-process
//! scheduler. Acquires a process lock so two ticks never run concurrently
//! against the same database.

use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use serde::Serialize;

use apimon_core::clock::SystemClock;
use apimon_core::config::Config;
use apimon_core::scheduler::Scheduler;
use apimon_core::store;

use super::{OutputFormat, TickArgs};

#[derive(Serialize)]
struct TickOutput {
    success: bool,
    rollups_touched: usize,
    alerts_created: usize,
    cleanup: CleanupOutcome,
    duration_ms: u64,
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "status")]
enum CleanupOutcome {
    #[serde(rename = "skipped")]
    Skipped,
    #[serde(rename = "completed")]
    Completed { observations_deleted: u64 },
    #[serde(rename = "failed")]
    Failed { error: String },
}

/// Execute the `apimon tick` command.
pub async fn execute(config: &Config, args: TickArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let format = OutputFormat::from_json_flag(args.json);

    let lock_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".apimon")
        .join("tick.lock");
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        anyhow::bail!(
            "another apimon tick process is running (lock: {})",
            lock_path.display()
        );
    }

    let pool = store::init_db(&config.storage.db_path).await?;
    let scheduler = Scheduler::new(
        pool.clone(),
        Arc::new(SystemClock),
        config.scheduler.to_scheduler_config(config.storage.retention_days),
    );

    let (success, rollups_touched, alerts_created, error) = match scheduler.tick().await {
        Ok(summary) => (true, summary.rollups_touched, summary.alerts_created, None),
        Err(e) => {
            tracing::error!(error = %e, "tick failed");
            (false, 0, 0, Some(e.to_string()))
        }
    };

    let cleanup = if args.force_cleanup {
        match scheduler.run_cleanup().await {
            Ok(deleted) => CleanupOutcome::Completed {
                observations_deleted: deleted,
            },
            Err(e) => {
                tracing::error!(error = %e, "cleanup failed");
                CleanupOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    } else {
        CleanupOutcome::Skipped
    };

    pool.close().await;

    let output = TickOutput {
        success,
        rollups_touched,
        alerts_created,
        cleanup,
        duration_ms: start.elapsed().as_millis() as u64,
        error,
    };

    print_output(&output, format);

    if !output.success {
        anyhow::bail!("tick failed: {}", output.error.unwrap_or_default());
    }

    Ok(())
}

fn print_output(output: &TickOutput, format: OutputFormat) {
    if format.is_json() {
        println!(
            "{}",
            serde_json::to_string_pretty(output).expect("serialization cannot fail")
        );
    } else {
        print_text_output(output);
    }
}

fn print_text_output(output: &TickOutput) {
    eprintln!(
        "apimon tick  rollups_touched={}  alerts_created={}  duration={}ms",
        output.rollups_touched, output.alerts_created, output.duration_ms,
    );

    match &output.cleanup {
        CleanupOutcome::Skipped => {}
        CleanupOutcome::Completed {
            observations_deleted,
        } => {
            eprintln!("  cleanup      OK     deleted {observations_deleted} observations");
        }
        CleanupOutcome::Failed { error } => {
            eprintln!("  cleanup      FAIL   {error}");
        }
    }

    if let Some(error) = &output.error {
        eprintln!();
        eprintln!("Error: {error}");
    }

    eprintln!();
    eprintln!(
        "Result: {}",
        if output.success { "success" } else { "failure" }
    );
}
