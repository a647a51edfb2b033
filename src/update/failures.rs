//! Failure list written after a batch and consumed by `--retry-failed`.
use crate::dataset::Campus;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A record that failed enrichment or validation in the last run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FailureRecord {
    pub name: String,
    pub campus: Campus,
}

impl FailureRecord {
    pub fn matches(&self, name: &str, campus: Campus) -> bool {
        self.campus == campus && self.name.trim() == name.trim()
    }
}

/// Load a failure list. A missing or blank file is an empty list.
pub fn load_failures(path: &Path) -> Result<Vec<FailureRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("read failure list {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let failures: Vec<FailureRecord> = serde_json::from_str(&text)
        .with_context(|| format!("parse failure list {}", path.display()))?;
    Ok(failures)
}

/// Overwrite the failure list.
pub fn write_failures(path: &Path, failures: &[FailureRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(failures).context("serialize failure list")?;
    text.push('\n');
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
