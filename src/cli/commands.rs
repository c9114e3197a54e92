//! CLI commands and argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Collect and extract Copilot usage metrics
#[derive(Parser, Debug)]
#[command(name = "usage-ingest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// API token, overrides `api.token` from the config file
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect, then extract
    Run {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Also export the scope's usage rows to this Parquet file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Collect raw pages only
    Collect {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Extract already collected pages, without network access
    Extract {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Print stored usage rows, one JSON object per line
    Records {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Validate the configuration file
    Validate,
}

/// Scope selection shared by every data command
#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Connection id
    #[arg(short = 'c', long, default_value = "1")]
    pub connection_id: u64,

    /// Organization name
    #[arg(short = 'o', long)]
    pub organization_name: String,

    /// Enterprise slug; queries enterprise endpoints when set
    #[arg(short = 'e', long)]
    pub enterprise_name: Option<String>,

    /// Only collect days on or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(short = 'a', long)]
    pub time_after: Option<String>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
