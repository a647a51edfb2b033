//! CLI argument parsing for the dataset workflow.
use crate::config::ProviderKind;
use crate::crawl::DEFAULT_CRAWL_LIMIT;
use crate::dataset::Campus;
use crate::dedupe::DEFAULT_THRESHOLD;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_FAILED_LIST: &str = "failed_restaurants.json";

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "matjip",
    version,
    about = "Keep a campus restaurant dataset fresh",
    after_help = "Examples:\n  matjip update --input restaurants.json --dry-run\n  matjip update --input restaurants.json --retry-failed failed_restaurants.json\n  matjip clean --input restaurants.json\n  matjip crawl --input restaurants.json --campus global --limit 5\n  matjip export --input restaurants.json --output restaurants.csv",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log progress diagnostics to stderr (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Update(UpdateArgs),
    Clean(CleanArgs),
    Crawl(CrawlArgs),
    Export(ExportArgs),
    Merge(MergeArgs),
    InitConfig(InitConfigArgs),
}

/// Completion backend selection shared by `update` and `crawl`.
#[derive(Args, Debug, Clone, Default)]
pub struct ProviderArgs {
    /// Config file (defaults to <config dir>/matjip/config.json when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Completion backend
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Model name for the HTTP backends
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Command for the `command` backend; receives the prompt on stdin
    #[arg(long, value_name = "CMD")]
    pub lm_command: Option<String>,

    /// Pause after every item, in milliseconds
    #[arg(long, value_name = "N")]
    pub delay_ms: Option<u64>,
}

#[derive(Parser, Debug)]
#[command(about = "Refresh every restaurant through the completion backend")]
pub struct UpdateArgs {
    /// Dataset to update
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    /// Where to write the result (defaults to --input)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Process everything but never write the dataset
    #[arg(long)]
    pub dry_run: bool,

    /// Only retry the records listed in this failure file
    #[arg(long, value_name = "PATH")]
    pub retry_failed: Option<PathBuf>,

    /// Append one line per processed record to this file
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Where to write this run's failures
    #[arg(long, value_name = "PATH", default_value = DEFAULT_FAILED_LIST)]
    pub failed_list: PathBuf,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Drop invalid entries and near-duplicate names")]
pub struct CleanArgs {
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    /// Where to write the result (defaults to --input)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Name similarity at or above which a later record is dropped
    #[arg(long, value_name = "F", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f64,
}

#[derive(Parser, Debug)]
#[command(about = "Collect new restaurants for a campus from map search text")]
pub struct CrawlArgs {
    /// Dataset to extend (created when missing)
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    #[arg(long, value_enum)]
    pub campus: Campus,

    /// Listing query (defaults to the campus neighbourhood plus 맛집)
    #[arg(long, value_name = "Q")]
    pub query: Option<String>,

    /// Maximum number of candidates to process
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CRAWL_LIMIT)]
    pub limit: usize,

    /// Command that prints page text for the query it reads on stdin
    #[arg(long, value_name = "CMD")]
    pub fetch_command: Option<String>,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Export restaurants as CSV")]
pub struct ExportArgs {
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub output: PathBuf,

    /// Only export this campus
    #[arg(long, value_enum)]
    pub campus: Option<Campus>,
}

#[derive(Parser, Debug)]
#[command(about = "Merge several datasets campus by campus")]
pub struct MergeArgs {
    #[arg(long, value_name = "PATH", num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub output: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Write a default config file")]
pub struct InitConfigArgs {
    /// Target path (defaults to <config dir>/matjip/config.json)
    #[arg(long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
