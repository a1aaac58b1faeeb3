//! Timesheet import from the weekly payroll sheet.
//!
//! The sheet is read from a CSV export (one header row, then 33 columns per
//! row) or straight from the workbook's week tab, and imported into the
//! hosted `time_periods` table with its breaks and fleet rows.

mod breaks;
mod cells;
mod import;
mod workbook;

use std::collections::{BTreeSet, HashSet};
use std::io::Read;

use crate::error::Result;

pub use breaks::{BreakSlot, plan_breaks, round_to_quarter};
pub use cells::is_site_placeholder;
pub use import::{Directory, FixOutcome, ImportOptions, ImportOutcome, fix_imported, import_rows};
pub use workbook::{read_workbook_week, week_sheet_name};

/// Columns of the exported sheet (0-based).
pub mod col {
    pub const DATE: usize = 0;
    pub const CONTRACT: usize = 1;
    pub const LOCATION: usize = 2;
    pub const SECTION: usize = 3;
    pub const EMPLOYEE: usize = 4;
    pub const START: usize = 5;
    pub const BREAK: usize = 6;
    pub const FINISH: usize = 7;
    pub const HOURS: usize = 8;
    /// Plant 1-6.
    pub const PLANT: std::ops::RangeInclusive<usize> = 9..=14;
    /// Mob 1-4.
    pub const MOB: std::ops::RangeInclusive<usize> = 15..=18;
    pub const MATERIAL: usize = 19;
    pub const QUANTITY: usize = 20;
    pub const TRAVEL: usize = 26;
    pub const ON_CALL: usize = 27;
    pub const MISC: usize = 28;
}

/// Columns in a complete row.
pub const SHEET_WIDTH: usize = 33;

/// Rows shorter than this cannot carry hours and are ignored.
pub const MIN_CELLS: usize = 9;

/// One data row of the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based line in the sheet (the header is line 1).
    pub line: usize,
    cells: Vec<String>,
}

impl SheetRow {
    pub fn new(line: usize, cells: Vec<String>) -> Self {
        Self { line, cells }
    }

    /// Number of cells actually present.
    pub fn width(&self) -> usize {
        self.cells.len()
    }

    /// Trimmed cell text; blank and missing cells are `None`.
    pub fn cell(&self, idx: usize) -> Option<&str> {
        self.cells
            .get(idx)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    /// Employee name unless blank or a placeholder.
    pub fn employee(&self) -> Option<&str> {
        self.cell(col::EMPLOYEE).filter(|n| !is_site_placeholder(n))
    }
}

/// Read the exported sheet, skipping the header row.
pub fn read_sheet<R: Read>(reader: R) -> Result<Vec<SheetRow>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (idx, record) in csv.records().enumerate() {
        let record = record?;
        if record.is_empty() {
            continue;
        }
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);
        let cells = record.iter().take(SHEET_WIDTH).map(str::to_string).collect();
        rows.push(SheetRow::new(line, cells));
    }
    Ok(rows)
}

/// Sorted unique employee names, placeholders excluded.
pub fn list_employees(rows: &[SheetRow]) -> Vec<String> {
    rows.iter()
        .filter_map(SheetRow::employee)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Parse an employee selection. Names containing commas are separated
/// with `|` instead.
pub fn parse_selection(raw: &str) -> HashSet<String> {
    let sep = if raw.contains('|') { '|' } else { ',' };
    raw.split(sep)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}
