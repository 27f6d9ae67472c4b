//! CLI subcommand argument definitions and implementations.
//!
//! Each subcommand struct defines its flags and arguments.
pub mod project;
pub mod serve;
pub mod tick;

use clap::Args;

/// Arguments for the `tick` subcommand.
#[derive(Debug, Args)]
pub struct TickArgs {
    /// Emit machine-readable JSON instead of a text summary
    #[arg(long)]
    pub json: bool,

    /// Also run the daily retention cleanup, regardless of when it last ran
    #[arg(long)]
    pub force_cleanup: bool,
}

/// Output format shared by commands that print a structured summary.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Text
        }
    }

    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Arguments for the `serve` subcommand.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Host address to bind to. Overrides the config file's `server.host`.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on. Overrides the config file's `server.port`.
    #[arg(long)]
    pub port: Option<u16>,
}

/// Arguments for the `project create` subcommand.
#[derive(Debug, Args)]
pub struct ProjectCreateArgs {
    /// Human-readable name for the new project
    pub name: String,
}
