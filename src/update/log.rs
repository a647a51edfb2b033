//! Append-only plain-text update log.
//!
//! One line per finished batch item:
//!
//! ```text
//! 2024-05-01T12:00:00+09:00	OK	Pasta House	seoul
//! 2024-05-01T12:00:01+09:00	FAIL	Kim's BBQ	seoul	no JSON object in completion response: ...
//! ```
use crate::dataset::Campus;
use anyhow::{Context, Result};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Fail,
    ValidateFail,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Fail => write!(f, "FAIL"),
            Self::ValidateFail => write!(f, "VALIDATE_FAIL"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry<'a> {
    pub timestamp: String,
    pub outcome: Outcome,
    pub name: &'a str,
    pub campus: Campus,
    pub detail: Option<String>,
}

impl fmt::Display for LogEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.timestamp,
            self.outcome,
            single_line(self.name),
            self.campus
        )?;
        if let Some(detail) = &self.detail {
            write!(f, "\t{}", single_line(detail))?;
        }
        Ok(())
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}

/// Log sink; without a path every append is a no-op.
pub struct UpdateLog {
    file: Option<File>,
}

impl UpdateLog {
    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open update log {}", path.display()))?;
        Ok(Self { file: Some(file) })
    }

    pub fn append(&mut self, entry: &LogEntry<'_>) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        writeln!(file, "{entry}").context("write update log entry")?;
        file.flush().context("flush update log")?;
        Ok(())
    }
}
