mod cli;
mod config;
mod crawl;
mod dataset;
mod dedupe;
mod enrich;
mod export;
mod persist;
mod update;
mod validate;
mod workflow;

use anyhow::Result;
use clap::Parser;
use cli::{Command, RootArgs};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = RootArgs::parse();
    // A missing .env is normal; keys may come from the real environment.
    dotenvy::dotenv().ok();
    init_tracing(args.verbose);

    match args.command {
        Command::Update(args) => workflow::run_update(args),
        Command::Clean(args) => workflow::run_clean(args),
        Command::Crawl(args) => workflow::run_crawl(args),
        Command::Export(args) => workflow::run_export(args),
        Command::Merge(args) => workflow::run_merge(args),
        Command::InitConfig(args) => workflow::run_init_config(args),
    }
}
