//! Dataset conversions for reporting: CSV export and multi-file merge.
use crate::dataset::{load_dataset, Campus, Dataset, Restaurant};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Column order of every CSV export.
pub const CSV_COLUMNS: [&str; 12] = [
    "name",
    "address",
    "phone",
    "rating",
    "review_count",
    "category",
    "price_range",
    "opening_hours",
    "campus",
    "source",
    "last_updated",
    "reviews",
];

const REVIEW_SEPARATOR: &str = " | ";
/// Spreadsheet tools need the BOM to detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Records selected for export, in campus order.
pub fn export_rows(dataset: &Dataset, campus: Option<Campus>) -> Vec<&Restaurant> {
    dataset
        .campuses()
        .filter(|(key, _)| campus.is_none_or(|wanted| wanted == *key))
        .flat_map(|(_, data)| data.restaurants.iter())
        .collect()
}

/// Render one record as CSV cells.
pub fn csv_row(record: &Restaurant) -> Vec<String> {
    CSV_COLUMNS
        .iter()
        .map(|column| match *column {
            "reviews" => record.reviews().join(REVIEW_SEPARATOR),
            field => cell(record.get(field)),
        })
        .collect()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Write `rows` as CSV to `writer`, header first.
pub fn write_csv<W: Write>(writer: W, rows: &[&Restaurant]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_COLUMNS).context("write CSV header")?;
    for record in rows {
        csv.write_record(csv_row(record))
            .with_context(|| format!("write CSV row for {}", record.name()))?;
    }
    csv.flush().context("flush CSV")?;
    Ok(())
}

/// Convert a dataset file to CSV. Returns the number of rows written; no
/// file is created when there is nothing to export.
pub fn export_csv(input: &Path, output: &Path, campus: Option<Campus>) -> Result<usize> {
    let dataset = load_dataset(input)?;
    let rows = export_rows(&dataset, campus);
    if rows.is_empty() {
        println!("nothing to export from {}", input.display());
        return Ok(0);
    }
    let mut file =
        File::create(output).with_context(|| format!("create {}", output.display()))?;
    file.write_all(UTF8_BOM)
        .with_context(|| format!("write {}", output.display()))?;
    write_csv(&mut file, &rows)?;
    println!("exported {} restaurant(s) to {}", rows.len(), output.display());
    Ok(rows.len())
}

/// Merge datasets campus by campus, in argument order.
///
/// Unreadable sources are reported and skipped. Top-level keys other than
/// campuses come from the first source that has them.
pub fn merge_datasets(inputs: &[PathBuf]) -> Result<Dataset> {
    let mut merged = Dataset::default();
    let mut loaded_any = false;
    for input in inputs {
        let source = match load_dataset(input) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("warning: skipping {}: {err:#}", input.display());
                continue;
            }
        };
        loaded_any = true;
        for (campus, data) in source.campuses() {
            let target = merged.campus_entry(campus);
            if target.restaurants.is_empty() && !data.campus.is_empty() {
                target.campus = data.campus.clone();
            }
            target.restaurants.extend(data.restaurants.iter().cloned());
        }
        for (key, value) in source.extra {
            merged.extra.entry(key).or_insert(value);
        }
    }
    if !loaded_any {
        anyhow::bail!("no readable input datasets");
    }
    Ok(merged)
}
