//! Command runners: resolve configuration at the boundary, then hand explicit
//! inputs to the library modules.
use crate::cli::{
    CleanArgs, CrawlArgs, ExportArgs, InitConfigArgs, MergeArgs, ProviderArgs, UpdateArgs,
};
use crate::config::{
    self, default_config_path, ConfigOverrides, UpdaterConfig, FETCH_COMMAND_VAR,
};
use crate::crawl::{self, CommandFetcher, CrawlOptions};
use crate::dataset::load_dataset;
use crate::dedupe::clean_dataset;
use crate::enrich::{build_service, CompletionService};
use crate::export;
use crate::persist::write_json_atomic;
use crate::update::{self, UpdateOptions};
use anyhow::{anyhow, Context, Result};
use std::env;

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn resolve(args: &ProviderArgs, fetch_command: Option<&str>) -> Result<UpdaterConfig> {
    let mut config = config::resolve_config(args.config.as_deref())?;
    config.apply(&ConfigOverrides {
        provider: args.provider,
        model: args.model.clone(),
        lm_command: args.lm_command.clone(),
        fetch_command: fetch_command.map(str::to_string),
        delay_ms: args.delay_ms,
    });
    config::validate_config(&config)?;
    Ok(config)
}

fn completion_service(config: &UpdaterConfig) -> Result<Box<dyn CompletionService>> {
    let provider = config::provider_config(config, env_lookup)?;
    let service = build_service(&provider).context("set up completion backend")?;
    tracing::info!(provider = ?provider.kind, model = ?provider.model, "completion backend ready");
    Ok(service)
}

pub fn run_update(args: UpdateArgs) -> Result<()> {
    let config = resolve(&args.provider, None)?;
    let service = completion_service(&config)?;
    let options = UpdateOptions {
        output: args.output.unwrap_or_else(|| args.input.clone()),
        input: args.input,
        dry_run: args.dry_run,
        retry_failed: args.retry_failed,
        failed_list: args.failed_list,
        log: args.log,
        delay: config.delay(),
    };
    let summary = update::run_update(&options, service.as_ref())?;
    tracing::info!(
        mode = ?summary.mode,
        attempted = summary.attempted,
        updated = summary.updated,
        failed = summary.failures.len(),
        persisted = summary.persisted,
        "update finished"
    );
    Ok(())
}

pub fn run_clean(args: CleanArgs) -> Result<()> {
    if !(0.0..=1.0).contains(&args.threshold) {
        return Err(anyhow!(
            "--threshold must be between 0 and 1 (got {})",
            args.threshold
        ));
    }
    let mut dataset = load_dataset(&args.input)?;
    let stats = clean_dataset(&mut dataset, args.threshold);
    for entry in &stats {
        println!(
            "{}: {} -> {} valid -> {} unique",
            entry.campus, entry.before, entry.valid, entry.unique
        );
    }
    let output = args.output.unwrap_or(args.input);
    write_json_atomic(&output, &dataset)
        .with_context(|| format!("persist dataset {}", output.display()))?;
    println!(
        "wrote {} ({} restaurant(s))",
        output.display(),
        dataset.restaurant_count()
    );
    Ok(())
}

pub fn run_crawl(args: CrawlArgs) -> Result<()> {
    let config = resolve(&args.provider, args.fetch_command.as_deref())?;
    let fetch_command = config
        .fetch_command
        .clone()
        .or_else(|| env_lookup(FETCH_COMMAND_VAR))
        .ok_or_else(|| {
            anyhow!("crawl needs --fetch-command, fetch_command in config, or {FETCH_COMMAND_VAR}")
        })?;
    let fetcher = CommandFetcher::from_command_line(&fetch_command)?;
    let service = completion_service(&config)?;
    let options = CrawlOptions {
        input: args.input,
        campus: args.campus,
        query: args.query,
        limit: args.limit,
        delay: config.delay(),
    };
    let summary = crawl::run_crawl(&options, &fetcher, service.as_ref())?;
    tracing::info!(
        candidates = summary.candidates,
        added = summary.added,
        skipped = summary.skipped,
        "crawl finished"
    );
    Ok(())
}

pub fn run_export(args: ExportArgs) -> Result<()> {
    export::export_csv(&args.input, &args.output, args.campus)?;
    Ok(())
}

pub fn run_merge(args: MergeArgs) -> Result<()> {
    let merged = export::merge_datasets(&args.inputs)?;
    write_json_atomic(&args.output, &merged)
        .with_context(|| format!("persist dataset {}", args.output.display()))?;
    println!(
        "merged {} restaurant(s) into {}",
        merged.restaurant_count(),
        args.output.display()
    );
    Ok(())
}

pub fn run_init_config(args: InitConfigArgs) -> Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => default_config_path().ok_or_else(|| anyhow!("no config directory; pass --path"))?,
    };
    if path.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    config::write_config(&path, &UpdaterConfig::default())?;
    println!("wrote {}", path.display());
    Ok(())
}
