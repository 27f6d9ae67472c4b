/// apimon CLI — one-shot scheduler ticks and server launch for the API
/// performance monitor.
///
/// Entry point for the apimon binary. Parses CLI arguments, initializes
/// logging, and dispatches to subcommand handlers.
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use apimon_core::config::Config;

/// API performance monitor — ingestion, aggregation, and alerting.
#[derive(Parser)]
#[command(name = "apimon")]
#[command(version)]
#[command(about = "API performance monitor — ingestion, aggregation, and alerting")]
#[command(after_help = "\
Quick start:
  1. apimon project create <name>   — create a project and mint its API key
  2. apimon serve                   — run the ingestion API + scheduler
  3. apimon tick                    — run a single scheduler tick (cron-friendly)")]
struct Cli {
    /// Path to config.toml
    #[arg(short = 'c', long, global = true, default_value = "~/.apimon/config.toml")]
    config: String,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run one Aggregate+Evaluate cycle and exit
    Tick(commands::TickArgs),
    /// Run the ingestion/management API with the scheduler in-process
    Serve(commands::ServeArgs),
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommands),
}

#[derive(clap::Subcommand)]
enum ProjectCommands {
    /// Create a project and mint its API key
    Create(commands::ProjectCreateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing-subscriber.
    //
    // Priority: RUST_LOG env var > --verbose/--quiet flags > default (warn).
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("apimon=debug,apimon_core=debug,apimon_server=debug,info")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::new("apimon=info,apimon_core=info,apimon_server=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose)
        .compact()
        .init();

    let config = Config::load_and_validate(Some(&cli.config)).map_err(|errors| {
        let joined = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        anyhow::anyhow!(
            "failed to load configuration: {joined}\n\
             Hint: apimon reads ~/.apimon/config.toml by default; pass --config to use another path."
        )
    })?;

    match cli.command {
        Commands::Tick(args) => commands::tick::execute(&config, args).await,
        Commands::Serve(args) => commands::serve::execute(&config, args).await,
        Commands::Project(ProjectCommands::Create(args)) => {
            commands::project::execute(&config, args).await
        }
    }
}
