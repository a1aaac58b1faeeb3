//! Direct reading of the staff-hours workbook.
//!
//! Each week lives on a tab named `Allocated Week (N)`. Data starts on row 2
//! and spans columns A to AG; cell AH1 holds the last used row number.

use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use log::{debug, info};

use super::{SHEET_WIDTH, SheetRow};
use crate::error::{Error, Result};

/// First data row (1-based, below the header).
const FIRST_ROW: u32 = 2;
/// Rows read when AH1 is blank or unreadable.
const DEFAULT_LAST_ROW: u32 = 500;
/// Upper bound on the row count taken from AH1.
const MAX_LAST_ROW: u32 = 20_000;
/// Column AH (0-based).
const LAST_ROW_COL: u32 = 33;

/// Tab name for a week number.
pub fn week_sheet_name(week: u32) -> String {
    format!("Allocated Week ({week})")
}

/// Read the rows of one week's tab.
///
/// # Errors
/// Fails if the workbook cannot be opened or has no tab for the week.
pub fn read_workbook_week(path: &Path, week: u32) -> Result<Vec<SheetRow>> {
    let mut workbook = open_workbook_auto(path)?;
    let name = week_sheet_name(week);
    if !workbook.sheet_names().iter().any(|n| *n == name) {
        return Err(Error::Invalid(format!(
            "No sheet '{}' in {}",
            name,
            path.display()
        )));
    }
    let range = workbook.worksheet_range(&name)?;
    let rows = rows_from_range(&range);
    info!("Loaded {} data row(s) from {} '{}'", rows.len(), path.display(), name);
    Ok(rows)
}

/// Data rows of a sheet range, blank rows skipped.
pub fn rows_from_range(range: &Range<Data>) -> Vec<SheetRow> {
    let last = last_row(range.get_value((0, LAST_ROW_COL)));
    debug!("Reading rows {}..={}", FIRST_ROW, last);

    let mut rows = Vec::new();
    for line in FIRST_ROW..=last {
        let cells: Vec<String> = (0..SHEET_WIDTH as u32)
            .map(|col| range.get_value((line - 1, col)).map(cell_text).unwrap_or_default())
            .collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(SheetRow::new(line as usize, cells));
    }
    rows
}

/// Last data row from the AH1 marker.
fn last_row(marker: Option<&Data>) -> u32 {
    let value = match marker {
        Some(Data::Int(n)) => Some(*n as f64),
        Some(Data::Float(x)) => Some(*x),
        Some(Data::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(x) if x >= f64::from(FIRST_ROW) => (x.trunc() as u32).min(MAX_LAST_ROW),
        _ => DEFAULT_LAST_ROW,
    }
}

/// Cell text in the form the CSV export would carry.
///
/// Dates stay as serial numbers; times of day and durations become `H:MM`.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(x) => x.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            if serial < 1.0 || dt.is_duration() {
                hours_minutes(serial)
            } else {
                serial.to_string()
            }
        }
    }
}

fn hours_minutes(days: f64) -> String {
    let minutes = (days * 24.0 * 60.0).round() as i64;
    format!("{}:{:02}", minutes / 60, minutes % 60)
}
