//! Batch update of a dataset through the enrichment client.
//!
//! Items are processed strictly one at a time with a fixed pause after each,
//! successful or not. Nothing but the append-only log is written until the
//! whole worklist has been processed; an interrupted run leaves the dataset
//! file as it was.
mod failures;
mod log;

pub use failures::{load_failures, write_failures, FailureRecord};
pub use log::{LogEntry, Outcome, UpdateLog};

use crate::dataset::{load_dataset, Campus, Dataset};
use crate::enrich::{now_timestamp, CompletionService, Enricher};
use crate::persist::write_json_atomic;
use crate::validate::validate_record;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Inputs of one batch run.
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub dry_run: bool,
    /// Retry only the records listed in this failure file.
    pub retry_failed: Option<PathBuf>,
    /// Where this run's failures are written.
    pub failed_list: PathBuf,
    pub log: Option<PathBuf>,
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Full,
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub mode: RunMode,
    pub attempted: usize,
    pub updated: usize,
    pub failures: Vec<FailureRecord>,
    pub persisted: bool,
}

impl UpdateSummary {
    fn empty(mode: RunMode) -> Self {
        Self {
            mode,
            attempted: 0,
            updated: 0,
            failures: Vec::new(),
            persisted: false,
        }
    }
}

/// A record scheduled for enrichment, addressed by campus and position.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkItem {
    campus: Campus,
    index: usize,
    name: String,
}

/// Run a batch update and return its summary. `summary.updated` is the
/// number of records merged.
pub fn run_update(options: &UpdateOptions, service: &dyn CompletionService) -> Result<UpdateSummary> {
    let (mode, retry_list) = match &options.retry_failed {
        Some(path) => {
            let failures = load_failures(path)?;
            if failures.is_empty() {
                println!("nothing to retry ({} is empty or missing)", path.display());
                return Ok(UpdateSummary::empty(RunMode::Retry));
            }
            (RunMode::Retry, Some(failures))
        }
        None => (RunMode::Full, None),
    };

    let mut dataset = load_dataset(&options.input)?;
    let worklist = build_worklist(&dataset, retry_list.as_deref());
    let mut log = match &options.log {
        Some(path) => UpdateLog::open(path)?,
        None => UpdateLog::disabled(),
    };

    let enricher = Enricher::new(service);
    let mut summary = UpdateSummary::empty(mode);
    let total = worklist.len();
    for (position, item) in worklist.iter().enumerate() {
        println!("[{}/{}] {} ({}) updating...", position + 1, total, item.name, item.campus);
        summary.attempted += 1;
        let (outcome, detail) = process_item(&mut dataset, item, &enricher);
        match outcome {
            Outcome::Ok => summary.updated += 1,
            Outcome::Fail | Outcome::ValidateFail => {
                println!("  {outcome}: {}", detail.as_deref().unwrap_or(""));
                summary.failures.push(FailureRecord {
                    name: item.name.clone(),
                    campus: item.campus,
                });
            }
        }
        log.append(&LogEntry {
            timestamp: now_timestamp(),
            outcome,
            name: &item.name,
            campus: item.campus,
            detail,
        })?;
        if !options.delay.is_zero() {
            thread::sleep(options.delay);
        }
    }

    if !summary.failures.is_empty() {
        write_failures(&options.failed_list, &summary.failures)?;
        println!(
            "wrote {} failure(s) to {}",
            summary.failures.len(),
            options.failed_list.display()
        );
    } else if options
        .retry_failed
        .as_deref()
        .is_some_and(|source| same_file(source, &options.failed_list))
    {
        // Every listed entry succeeded; the next retry has nothing to do.
        write_failures(&options.failed_list, &[])?;
        println!("cleared {}", options.failed_list.display());
    }

    if options.dry_run {
        println!("dry run: {} not written", options.output.display());
    } else if summary.updated > 0 {
        write_json_atomic(&options.output, &dataset)
            .with_context(|| format!("persist dataset {}", options.output.display()))?;
        summary.persisted = true;
        println!("wrote {}", options.output.display());
    }

    println!(
        "updated {} of {} restaurant(s); {} failed",
        summary.updated,
        summary.attempted,
        summary.failures.len()
    );
    Ok(summary)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Every named record in campus order, or only the listed failures.
fn build_worklist(dataset: &Dataset, retry: Option<&[FailureRecord]>) -> Vec<WorkItem> {
    let mut worklist = Vec::new();
    for (campus, data) in dataset.campuses() {
        for (index, record) in data.restaurants.iter().enumerate() {
            let name = record.name();
            if name.is_empty() {
                tracing::warn!(%campus, index, "skipping record without a name");
                continue;
            }
            if let Some(failures) = retry {
                if !failures.iter().any(|failure| failure.matches(name, campus)) {
                    continue;
                }
            }
            worklist.push(WorkItem {
                campus,
                index,
                name: name.to_string(),
            });
        }
    }
    if let Some(failures) = retry {
        for failure in failures {
            if !worklist
                .iter()
                .any(|item| failure.matches(&item.name, item.campus))
            {
                tracing::warn!(name = %failure.name, campus = %failure.campus, "retry entry not found in dataset");
            }
        }
    }
    worklist
}

/// Enrich, validate and merge one record.
fn process_item(
    dataset: &mut Dataset,
    item: &WorkItem,
    enricher: &Enricher<'_>,
) -> (Outcome, Option<String>) {
    let response = match enricher.enrich(&item.name, item.campus) {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(name = %item.name, error = %err, "enrichment failed");
            return (Outcome::Fail, Some(err.to_string()));
        }
    };
    let response = Value::Object(response);
    if let Err(issue) = validate_record(&response) {
        tracing::warn!(name = %item.name, issue = %issue, "enrichment response rejected");
        return (Outcome::ValidateFail, Some(issue.to_string()));
    }
    let Value::Object(fields) = response else {
        return (Outcome::ValidateFail, Some("record is not an object".to_string()));
    };
    let record = dataset
        .campus_mut(item.campus)
        .and_then(|data| data.restaurants.get_mut(item.index));
    match record {
        Some(record) => {
            let written = record.merge_from(&fields);
            tracing::info!(name = %item.name, fields = written, "merged enrichment");
            (Outcome::Ok, None)
        }
        None => (Outcome::Fail, Some("record disappeared from dataset".to_string())),
    }
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod tests;
