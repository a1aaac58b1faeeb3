//! Sync of the legacy job list into the hosted `projects` table.
//!
//! The job list lives in a desktop database with one table per year; the
//! table is exported to CSV and each enabled job is upserted by its job
//! number.
//!
//! Structure:
//! - Pure functions: record reading and field mapping
//! - Effect functions: upsert and replace against the remote table

use std::collections::{HashMap, HashSet};
use std::io::Read;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, error, info, warn};
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::remote::{Query, Remote};

const PROJECTS: &str = "projects";

/// Rows inserted per request in replace mode.
pub const BATCH_SIZE: usize = 100;

/// Upserts between progress lines.
const PROGRESS_EVERY: usize = 50;

/// Never a real id; lets a delete match every row.
const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Export column to `projects` column.
pub const FIELD_MAPPING: &[(&str, &str)] = &[
    ("Job_Number", "project_number"),
    ("Description_of_Work", "description_of_work"),
    ("Folder_Description", "project_name"),
    ("Address", "address"),
    ("Townland", "townland"),
    ("Town", "town"),
    ("County", "county"),
    ("Client_Name", "client_name"),
    ("Enabled", "is_active"),
    ("Completion_Date", "completion_date"),
    ("Latitude_North", "latitude"),
    ("Longitude_West", "longitude"),
];

/// One exported row, by column name.
pub type Record = HashMap<String, String>;

/// How rows reach the remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Update by project number, insert when new.
    #[default]
    Upsert,
    /// Delete every project, then insert in batches.
    Replace,
}

/// Counters for a sync run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub read: usize,
    /// Records without a project number.
    pub skipped: usize,
    /// Later records repeating an earlier project number.
    pub duplicates: usize,
    pub updated: usize,
    pub inserted: usize,
    pub errors: usize,
}

// ============================================================================
// PURE FUNCTIONS (Reading and mapping)
// ============================================================================

/// Read an exported year table.
pub fn read_export<R: Read>(reader: R) -> Result<Vec<Record>> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = csv
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in csv.records() {
        let row = row?;
        let record = headers
            .iter()
            .cloned()
            .zip(row.iter().map(str::to_string))
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// Yes/No columns: `true`, `yes`, `-1` and `1` are set.
pub fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "yes" | "-1" | "1"
    )
}

/// Enabled records, optionally narrowed to one job number.
///
/// # Errors
/// Fails when a job number is given and no enabled record carries it.
pub fn select_enabled(records: Vec<Record>, project: Option<&str>) -> Result<Vec<Record>> {
    let selected: Vec<Record> = records
        .into_iter()
        .filter(|r| r.get("Enabled").is_some_and(|v| is_truthy(v)))
        .filter(|r| {
            project.is_none_or(|p| r.get("Job_Number").is_some_and(|n| n.trim() == p.trim()))
        })
        .collect();

    match project {
        Some(p) if selected.is_empty() => Err(Error::Invalid(format!(
            "Project '{p}' not found (check that Enabled is set and Job_Number matches exactly)"
        ))),
        _ => Ok(selected),
    }
}

/// Coordinate text to degrees; west longitudes are stored negative.
pub fn convert_coordinate(raw: &str, is_longitude: bool) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.parse::<f64>() {
        Ok(value) if is_longitude && value > 0.0 => Some(-value),
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Could not convert coordinate: {}", raw);
            None
        }
    }
}

/// Date text to `YYYY-MM-DD`; anything unreadable is `None`.
pub fn convert_date(raw: &str) -> Option<String> {
    let s = raw.trim();
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| NaiveDate::parse_from_str(s, "%d/%m/%Y").ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%d/%m/%Y %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn trimmed(raw: &str) -> Value {
    match raw.trim() {
        "" => Value::Null,
        s => json!(s),
    }
}

/// Map an exported record onto `projects` columns.
///
/// Returns `None` when the record has no job number. Columns missing from
/// the export are left out of the row.
pub fn map_fields(record: &Record) -> Option<Map<String, Value>> {
    let mut project = Map::new();

    for (source, target) in FIELD_MAPPING {
        let Some(raw) = record.get(*source) else {
            continue;
        };
        let value = match *target {
            "latitude" => json!(convert_coordinate(raw, false)),
            "longitude" => json!(convert_coordinate(raw, true)),
            "is_active" => json!(is_truthy(raw)),
            "completion_date" => json!(convert_date(raw)),
            _ => trimmed(raw),
        };
        project.insert(target.to_string(), value);
    }

    let number = project
        .get("project_number")
        .and_then(Value::as_str)
        .map(str::to_string);
    let Some(number) = number else {
        warn!(
            "No project_number for record ID {} - skipping",
            record.get("ID").map(|s| s.trim()).unwrap_or("Unknown")
        );
        return None;
    };

    let has_name = project
        .get("project_name")
        .and_then(Value::as_str)
        .is_some();
    if !has_name {
        let name = match record.get("Address").map(|a| a.trim()) {
            Some(address) if !address.is_empty() => format!("{number} - {address}"),
            _ => number.clone(),
        };
        project.insert("project_name".to_string(), json!(name));
    }

    project
        .entry("is_active")
        .or_insert(Value::Bool(true));

    Some(project)
}

// ============================================================================
// EFFECT FUNCTIONS (Remote writes)
// ============================================================================

/// Map and write records to the remote table.
///
/// # Errors
/// Fails only when replace mode cannot clear the table; per-project
/// failures are counted.
pub fn sync_projects(remote: &dyn Remote, records: &[Record], mode: SyncMode) -> Result<SyncOutcome> {
    let mut outcome = SyncOutcome {
        read: records.len(),
        ..SyncOutcome::default()
    };

    let mapped: Vec<Map<String, Value>> = records.iter().filter_map(map_fields).collect();
    outcome.skipped = records.len() - mapped.len();
    if outcome.skipped > 0 {
        warn!("Skipped {} projects (missing project number)", outcome.skipped);
    }

    let mapped = first_per_number(mapped, &mut outcome);
    if mapped.is_empty() {
        warn!("No valid projects to sync");
        return Ok(outcome);
    }

    match mode {
        SyncMode::Upsert => upsert_all(remote, &mapped, &mut outcome),
        SyncMode::Replace => {
            warn!("Deleting all existing projects...");
            remote.delete(PROJECTS, &Query::new().neq("id", NIL_UUID))?;
            info!("Deleted existing projects");
            insert_batches(remote, &mapped, &mut outcome);
        }
    }

    Ok(outcome)
}

/// Keep the first record of each project number.
fn first_per_number(
    projects: Vec<Map<String, Value>>,
    outcome: &mut SyncOutcome,
) -> Vec<Map<String, Value>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(projects.len());
    for project in projects {
        let number = project
            .get("project_number")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if seen.insert(number.clone()) {
            kept.push(project);
        } else {
            warn!("Duplicate project_number '{}' in export - keeping the first", number);
            outcome.duplicates += 1;
        }
    }
    kept
}

fn upsert_all(remote: &dyn Remote, projects: &[Map<String, Value>], outcome: &mut SyncOutcome) {
    let total = projects.len();
    for project in projects {
        let number = project
            .get("project_number")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match upsert_one(remote, number, project) {
            Ok(true) => outcome.updated += 1,
            Ok(false) => outcome.inserted += 1,
            Err(e) => {
                outcome.errors += 1;
                let name = project
                    .get("project_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                error!("Error processing project_number '{}' (name: '{}'): {}", number, name, e);
                continue;
            }
        }
        let done = outcome.updated + outcome.inserted;
        if done % PROGRESS_EVERY == 0 {
            info!("Processed {}/{}...", done, total);
        }
    }
}

/// Returns `true` when an existing row was updated.
fn upsert_one(remote: &dyn Remote, number: &str, project: &Map<String, Value>) -> Result<bool> {
    let existing = remote.select(
        PROJECTS,
        &Query::new().select("id").eq("project_number", number),
    )?;

    match existing.first().and_then(|row| row.get("id")) {
        Some(id) => {
            let changes: Map<String, Value> = project
                .iter()
                .filter(|(k, _)| k.as_str() != "project_number")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let id = crate::remote::cell_text(id);
            debug!("Updating project {} (id {})", number, id);
            remote.update(PROJECTS, &Query::new().eq("id", id), &Value::Object(changes))?;
            Ok(true)
        }
        None => {
            debug!("Inserting project {}", number);
            remote.insert(PROJECTS, &[Value::Object(project.clone())])?;
            Ok(false)
        }
    }
}

fn insert_batches(remote: &dyn Remote, projects: &[Map<String, Value>], outcome: &mut SyncOutcome) {
    let batches = projects.len().div_ceil(BATCH_SIZE);
    for (idx, batch) in projects.chunks(BATCH_SIZE).enumerate() {
        let rows: Vec<Value> = batch.iter().cloned().map(Value::Object).collect();
        match remote.insert(PROJECTS, &rows) {
            Ok(_) => outcome.inserted += batch.len(),
            Err(e) => {
                outcome.errors += batch.len();
                error!("Error inserting batch: {}", e);
            }
        }
        info!("Processed batch {}/{}", idx + 1, batches);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryRemote;

    const EXPORT: &str = "\u{feff}ID,Job_Number,Description_of_Work,Folder_Description,Address,Town,County,Client_Name,Enabled,Completion_Date,Latitude_North,Longitude_West
1,A6-0001,Resurfacing , A6-0001 Main St,Main St,Ennis,Clare,Acme,True,2026-03-31,52.84° N,8.98
2,A6-0002,Drainage,,Quay Rd,Galway,Galway,Beta,-1,31/12/2026,53.27,-9.05
3,A6-0003,Fencing,,,,,,No,,,
4,,Orphan,,,,,,Yes,,,
";

    fn records() -> Vec<Record> {
        read_export(EXPORT.as_bytes()).unwrap()
    }

    // --- Mapping tests ---

    #[test]
    fn test_read_export_strips_bom() {
        let records = records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0]["ID"], "1");
        assert_eq!(records[0]["Job_Number"], "A6-0001");
    }

    #[test]
    fn test_select_enabled() {
        let enabled = select_enabled(records(), None).unwrap();
        assert_eq!(enabled.len(), 3);

        let one = select_enabled(records(), Some("A6-0002")).unwrap();
        assert_eq!(one.len(), 1);

        let err = select_enabled(records(), Some("A6-0003")).unwrap_err();
        assert!(err.to_string().contains("A6-0003"));
    }

    #[test]
    fn test_convert_coordinate() {
        assert_eq!(convert_coordinate("52.84° N", false), Some(52.84));
        assert_eq!(convert_coordinate("8.98", true), Some(-8.98));
        assert_eq!(convert_coordinate("-9.05", true), Some(-9.05));
        assert_eq!(convert_coordinate("", true), None);
        assert_eq!(convert_coordinate("1.2.3", false), None);
    }

    #[test]
    fn test_convert_date() {
        assert_eq!(convert_date("2026-03-31"), Some("2026-03-31".to_string()));
        assert_eq!(convert_date("2026-03-31 00:00:00"), Some("2026-03-31".to_string()));
        assert_eq!(convert_date("31/12/2026"), Some("2026-12-31".to_string()));
        assert_eq!(convert_date("31/12/2026 00:00:00"), Some("2026-12-31".to_string()));
        assert_eq!(convert_date("soon"), None);
        assert_eq!(convert_date(""), None);
    }

    #[test]
    fn test_map_fields() {
        let project = map_fields(&records()[0]).unwrap();

        assert_eq!(project["project_number"], "A6-0001");
        assert_eq!(project["description_of_work"], "Resurfacing");
        assert_eq!(project["project_name"], "A6-0001 Main St");
        assert_eq!(project["is_active"], true);
        assert_eq!(project["completion_date"], "2026-03-31");
        assert_eq!(project["latitude"], 52.84);
        assert_eq!(project["longitude"], -8.98);
        assert!(!project.contains_key("townland"));
    }

    #[test]
    fn test_map_fields_name_fallbacks() {
        let records = records();
        let with_address = map_fields(&records[1]).unwrap();
        assert_eq!(with_address["project_name"], "A6-0002 - Quay Rd");

        let bare = map_fields(&records[2]).unwrap();
        assert_eq!(bare["project_name"], "A6-0003");
        assert_eq!(bare["is_active"], false);
        assert!(bare["completion_date"].is_null());
    }

    #[test]
    fn test_map_fields_requires_number() {
        assert!(map_fields(&records()[3]).is_none());
    }

    #[test]
    fn test_is_active_defaults_true() {
        let record: Record = [("Job_Number".to_string(), "B1".to_string())].into();
        let project = map_fields(&record).unwrap();
        assert_eq!(project["is_active"], true);
    }

    // --- Sync tests ---

    #[test]
    fn test_upsert_updates_and_inserts() {
        let remote = MemoryRemote::new().with_rows(
            PROJECTS,
            vec![json!({"id": "p-1", "project_number": "A6-0001", "town": "Old"})],
        );
        let enabled = select_enabled(records(), None).unwrap();

        let outcome = sync_projects(&remote, &enabled, SyncMode::Upsert).unwrap();

        assert_eq!(
            outcome,
            SyncOutcome {
                read: 3,
                skipped: 1,
                duplicates: 0,
                updated: 1,
                inserted: 1,
                errors: 0
            }
        );
        let rows = remote.rows(PROJECTS);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["town"], "Ennis");
        assert_eq!(rows[0]["id"], "p-1");
        assert_eq!(rows[1]["project_number"], "A6-0002");
    }

    #[test]
    fn test_upsert_counts_failures() {
        let remote = MemoryRemote::new();
        remote.fail_inserts(PROJECTS);
        let enabled = select_enabled(records(), None).unwrap();

        let outcome = sync_projects(&remote, &enabled, SyncMode::Upsert).unwrap();

        assert_eq!(outcome.errors, 2);
        assert_eq!(outcome.inserted, 0);
    }

    #[test]
    fn test_replace_clears_then_inserts() {
        let remote = MemoryRemote::new().with_rows(
            PROJECTS,
            vec![json!({"id": "p-9", "project_number": "OLD"})],
        );
        let enabled = select_enabled(records(), None).unwrap();

        let outcome = sync_projects(&remote, &enabled, SyncMode::Replace).unwrap();

        assert_eq!(outcome.inserted, 2);
        let numbers: Vec<Value> = remote
            .rows(PROJECTS)
            .iter()
            .map(|r| r["project_number"].clone())
            .collect();
        assert_eq!(numbers, vec![json!("A6-0001"), json!("A6-0002")]);
    }

    const REPEATED: &str = "Job_Number,Description_of_Work,Enabled
A6-0009,First,Yes
A6-0009,Second,Yes
A6-0010,Other,Yes
";

    #[test]
    fn test_replace_keeps_first_of_repeated_numbers() {
        let remote = MemoryRemote::new();
        let records = select_enabled(read_export(REPEATED.as_bytes()).unwrap(), None).unwrap();

        let outcome = sync_projects(&remote, &records, SyncMode::Replace).unwrap();

        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.inserted, 2);
        let rows = remote.rows(PROJECTS);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["description_of_work"], "First");
    }

    #[test]
    fn test_upsert_keeps_first_of_repeated_numbers() {
        let remote = MemoryRemote::new().with_rows(
            PROJECTS,
            vec![json!({"id": "p-9", "project_number": "A6-0009", "description_of_work": "Old"})],
        );
        let records = select_enabled(read_export(REPEATED.as_bytes()).unwrap(), None).unwrap();

        let outcome = sync_projects(&remote, &records, SyncMode::Upsert).unwrap();

        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(remote.rows(PROJECTS)[0]["description_of_work"], "First");
    }
}
