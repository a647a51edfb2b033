//! Collect new restaurants for a campus from map search text.
//!
//! Page capture is delegated to a `PageFetcher`; the shipped one runs a
//! user-configured command with the search query on stdin and treats its
//! stdout as the page text.
use crate::dataset::{Campus, Dataset, Restaurant};
use crate::dedupe::is_valid_entry;
use crate::enrich::{now_timestamp, run_with_stdin, CompletionService, Enricher};
use crate::persist::write_json_atomic;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CRAWL_LIMIT: usize = 10;
pub const CRAWL_SOURCE: &str = "naver_map";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("page fetcher misconfigured: {0}")]
    Config(String),
    #[error("page fetch failed for {query:?}: {reason}")]
    Failed { query: String, reason: String },
    #[error("page fetch returned no text for {0:?}")]
    Empty(String),
}

/// Anything that turns a search query into page text.
pub trait PageFetcher {
    fn fetch(&self, query: &str) -> Result<String, FetchError>;
}

/// Runs a command with the query on stdin; stdout is the page text.
pub struct CommandFetcher {
    argv: Vec<String>,
}

impl CommandFetcher {
    pub fn from_command_line(command: &str) -> Result<Self, FetchError> {
        let argv = shell_words::split(command)
            .map_err(|err| FetchError::Config(format!("parse fetch command {command:?}: {err}")))?;
        let Some(program) = argv.first() else {
            return Err(FetchError::Config("fetch command is empty".into()));
        };
        which::which(program)
            .map_err(|err| FetchError::Config(format!("fetch command {program:?}: {err}")))?;
        Ok(Self { argv })
    }
}

impl PageFetcher for CommandFetcher {
    fn fetch(&self, query: &str) -> Result<String, FetchError> {
        let text = run_with_stdin(&self.argv, query).map_err(|reason| FetchError::Failed {
            query: query.to_string(),
            reason,
        })?;
        if text.trim().is_empty() {
            return Err(FetchError::Empty(query.to_string()));
        }
        Ok(text)
    }
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub input: PathBuf,
    pub campus: Campus,
    /// Listing query; defaults to the campus neighbourhood plus "맛집".
    pub query: Option<String>,
    pub limit: usize,
    pub delay: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub candidates: usize,
    pub added: usize,
    pub skipped: usize,
}

pub fn listing_query(campus: Campus) -> String {
    format!("{} 맛집", campus.location_hint())
}

/// Candidate names from listing text: one per non-empty line, first `limit`.
pub fn candidate_names(listing: &str, limit: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in listing.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if names.len() == limit {
            break;
        }
        if !names.iter().any(|name| name == line) {
            names.push(line.to_string());
        }
    }
    names
}

/// Crawl one campus and append new restaurants to `options.input`.
///
/// A missing input file starts an empty dataset. The file is only rewritten
/// when at least one restaurant was added.
pub fn run_crawl(
    options: &CrawlOptions,
    fetcher: &dyn PageFetcher,
    service: &dyn CompletionService,
) -> Result<CrawlSummary> {
    let mut dataset = if options.input.exists() {
        crate::dataset::load_dataset(&options.input)?
    } else {
        Dataset::default()
    };

    let query = options
        .query
        .clone()
        .unwrap_or_else(|| listing_query(options.campus));
    let listing = fetcher
        .fetch(&query)
        .with_context(|| format!("fetch listing for {}", options.campus))?;
    let names = candidate_names(&listing, options.limit);
    println!("{} candidate(s) for {query}", names.len());

    let enricher = Enricher::new(service);
    let mut summary = CrawlSummary {
        candidates: names.len(),
        ..CrawlSummary::default()
    };
    for (position, name) in names.iter().enumerate() {
        println!("[{}/{}] {name}", position + 1, names.len());
        match crawl_one(name, options.campus, fetcher, &enricher) {
            Some(record) => {
                let data = dataset.campus_entry(options.campus);
                if data.contains(record.name()) {
                    tracing::info!(name = %record.name(), "already in dataset");
                    summary.skipped += 1;
                } else {
                    data.restaurants.push(record);
                    summary.added += 1;
                }
            }
            None => summary.skipped += 1,
        }
        if !options.delay.is_zero() {
            thread::sleep(options.delay);
        }
    }

    if summary.added > 0 {
        write_json_atomic(&options.input, &dataset)
            .with_context(|| format!("persist dataset {}", options.input.display()))?;
        println!(
            "added {} restaurant(s) to {}",
            summary.added,
            options.input.display()
        );
    } else {
        println!("no new restaurants for {}", options.campus);
    }
    Ok(summary)
}

/// Fetch and extract one candidate. `None` when the item is skipped.
fn crawl_one(
    name: &str,
    campus: Campus,
    fetcher: &dyn PageFetcher,
    enricher: &Enricher<'_>,
) -> Option<Restaurant> {
    let page = match fetcher.fetch(&format!("{name} {}", campus.location_hint())) {
        Ok(page) => page,
        Err(err) => {
            eprintln!("  skipped: {err}");
            return None;
        }
    };
    let mut record = match enricher.extract(name, &page) {
        Ok(fields) => Restaurant::from_fields(fields),
        Err(err) => {
            tracing::warn!(name, error = %err, "extraction failed; keeping name only");
            Restaurant::new(name)
        }
    };
    if record.name().is_empty() {
        record.set("name", Value::String(name.to_string()));
    }
    record.set("campus", Value::String(campus.key().to_string()));
    record.set("source", Value::String(CRAWL_SOURCE.to_string()));
    record.set("last_updated", Value::String(now_timestamp()));
    if !is_valid_entry(&record) {
        eprintln!("  skipped: invalid entry");
        return None;
    }
    Some(record)
}
