//! Report formatting for duplicate scans.
//!
//! Pure functions: (DuplicateReport, OutputFormat) -> String.
//! No I/O, no side effects.

use humansize::{format_size, BINARY};

use crate::error::Result;
use crate::types::{DuplicateReport, OutputFormat};

/// Characters of the hash shown in human output.
const HASH_PREFIX: usize = 12;

/// Format a scan report for output.
pub fn format_report(report: &DuplicateReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(format_human(report)),
        OutputFormat::Json => format_json(report),
    }
}

// ============================================================================
// HUMAN FORMAT
// ============================================================================

fn format_human(report: &DuplicateReport) -> String {
    let mut out = String::new();

    if !report.groups.is_empty() {
        out.push_str("=== Duplicate Groups ===\n");
        for group in &report.groups {
            let hex = group.hash.to_hex();
            let size = group.files.first().map(|f| f.size).unwrap_or(0);
            out.push_str(&format!(
                "[{}] {} ({} each)\n",
                group.id,
                &hex[..HASH_PREFIX],
                format_size(size, BINARY)
            ));
            for file in &group.files {
                out.push_str(&format!("  └─ {}\n", file.path.display()));
            }
        }
        out.push('\n');
    }

    if !report.skipped.is_empty() {
        out.push_str("=== Skipped (read errors) ===\n");
        for (path, error) in &report.skipped {
            out.push_str(&format!("  {} - {}\n", path.display(), error));
        }
        out.push('\n');
    }

    out.push_str(&format_summary(report));
    out
}

fn format_summary(report: &DuplicateReport) -> String {
    let mut out = String::new();
    out.push_str("=== Summary ===\n");
    out.push_str(&format!("Files scanned:      {}\n", report.files_scanned));
    out.push_str(&format!("Files hashed:       {}\n", report.files_hashed));
    out.push_str(&format!("Duplicate groups:   {}\n", report.groups.len()));
    out.push_str(&format!("Duplicate files:    {}\n", report.duplicate_files()));
    if !report.skipped.is_empty() {
        out.push_str(&format!("Skipped (errors):   {}\n", report.skipped.len()));
    }
    out.push_str(&format!(
        "Space recoverable:  {}\n",
        format_size(report.bytes_recoverable, BINARY)
    ));
    out
}

// ============================================================================
// JSON FORMAT
// ============================================================================

fn format_json(report: &DuplicateReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

// ============================================================================
// TESTS
// ============================================================================
