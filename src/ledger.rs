//! The duplicate-files ledger: an editable CSV.
//!
//! `dupes scan` writes one row per duplicate file with a blank
//! `mark_for_deletion` column. The user marks rows in a spreadsheet and
//! `dupes delete` reads them back.

use std::io::{Read, Write};
use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::error::{Error, Result};
use crate::types::DuplicateReport;

/// Header row, in column order.
pub const HEADER: [&str; 7] = [
    "file_name",
    "full_path",
    "file_size",
    "date_modified",
    "file_hash",
    "duplicate_group_id",
    "mark_for_deletion",
];

/// Values (trimmed, case-insensitive) that mark a row for deletion.
pub const MARK_VALUES: [&str; 6] = ["y", "yes", "1", "true", "x", "delete"];

/// A ledger row the user marked for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub path: PathBuf,
    pub group_id: Option<usize>,
    pub marked: bool,
}

/// Returns true if a cell value means "delete this file".
pub fn is_marked(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    MARK_VALUES.contains(&v.as_str())
}

/// Write the report as ledger rows.
pub fn write_ledger<W: Write>(report: &DuplicateReport, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;

    for group in &report.groups {
        let hash = group.hash.to_hex();
        let group_id = group.id.to_string();
        for file in &group.files {
            let name = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let modified = file
                .modified
                .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();

            let full_path = file.path.to_string_lossy().into_owned();
            let size = file.size.to_string();
            csv.write_record([
                name.as_str(),
                full_path.as_str(),
                size.as_str(),
                modified.as_str(),
                hash.as_str(),
                group_id.as_str(),
                "",
            ])?;
        }
    }

    csv.flush()?;
    Ok(())
}

/// Read every usable ledger row.
///
/// # Errors
/// Fails if the file is empty or lacks the `full_path` /
/// `mark_for_deletion` columns.
pub fn read_ledger<R: Read>(reader: R) -> Result<Vec<LedgerEntry>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = csv.records();

    let header = match records.next() {
        Some(h) => h?,
        None => return Err(Error::Invalid("CSV is empty.".to_string())),
    };

    let column = |name: &str| header.iter().position(|h| h.trim() == name);
    let (path_idx, mark_idx) = match (column("full_path"), column("mark_for_deletion")) {
        (Some(p), Some(m)) => (p, m),
        _ => {
            return Err(Error::Invalid(
                "CSV must have columns 'full_path' and 'mark_for_deletion'.".to_string(),
            ));
        }
    };
    let group_idx = column("duplicate_group_id");

    let mut entries = Vec::new();
    for record in records {
        let record = record?;
        if record.len() <= path_idx.max(mark_idx) {
            continue;
        }
        let path = record[path_idx].trim();
        if path.is_empty() {
            continue;
        }
        let group_id = group_idx
            .and_then(|i| record.get(i))
            .and_then(|g| g.trim().parse().ok());

        entries.push(LedgerEntry {
            path: PathBuf::from(path),
            group_id,
            marked: is_marked(&record[mark_idx]),
        });
    }

    Ok(entries)
}
