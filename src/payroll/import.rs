//! Import of sheet rows into `time_periods` and the fix-up of earlier
//! imports.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::{debug, info, warn};
use serde_json::{Map, Value, json};

use super::breaks::plan_breaks;
use super::cells::{
    is_site_placeholder, parse_date, parse_hours, parse_int, parse_minutes, parse_number,
    parse_on_call, parse_time,
};
use super::{MIN_CELLS, SheetRow, col};
use crate::error::Result;
use crate::remote::{Query, Remote, cell_text};

const TIME_PERIODS: &str = "time_periods";
const BREAKS: &str = "time_period_breaks";
const USED_FLEET: &str = "time_period_used_fleet";
const MOBILISED_FLEET: &str = "time_period_mobilised_fleet";

/// Timestamp format the hosted tables store.
const TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S.000Z";

const FLEET_PREFIX: &str = "fleet no ";

// ============================================================================
// LOOKUPS
// ============================================================================

struct Plant {
    id: Value,
    number: String,
    description: String,
}

/// Where a time period is booked.
#[derive(Debug, Clone, PartialEq)]
enum Target {
    Plant(Value),
    Workshop(Value),
    Project(Value),
    Unmatched,
}

impl Target {
    fn describe(&self) -> String {
        match self {
            Target::Plant(id) => format!("large_plant_id={}", cell_text(id)),
            Target::Workshop(id) => format!("workshop_tasks_id={}", cell_text(id)),
            Target::Project(id) => format!("project_id={}", cell_text(id)),
            Target::Unmatched => "no match (project/plant/task)".to_string(),
        }
    }
}

/// Plant, workshop task and project references loaded once per run.
pub struct Directory {
    plants: Vec<Plant>,
    workshops: Vec<(Value, String)>,
    projects: Vec<(Value, String)>,
}

fn id_of(row: &Value) -> Option<Value> {
    row.get("id")
        .filter(|id| !id.is_null() && id.as_str() != Some(""))
        .cloned()
}

fn text_of(row: &Value, field: &str) -> String {
    match row.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(v) => cell_text(v).trim().to_string(),
    }
}

fn plant_keys(plant: &Plant) -> [&str; 2] {
    [plant.number.as_str(), plant.description.as_str()]
}

/// Plant number from a `Fleet No <n>` section.
fn fleet_number(section: &str) -> Option<&str> {
    if section.len() <= FLEET_PREFIX.len() {
        return None;
    }
    let prefix = section.get(..FLEET_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(FLEET_PREFIX) {
        return None;
    }
    section
        .get(FLEET_PREFIX.len()..)
        .map(str::trim)
        .filter(|n| !n.is_empty())
}

impl Directory {
    pub fn load(remote: &dyn Remote) -> Result<Self> {
        let plants = remote
            .select_all("large_plant", &Query::new().select("id, plant_no, plant_description"))?
            .iter()
            .filter_map(|row| {
                Some(Plant {
                    id: id_of(row)?,
                    number: text_of(row, "plant_no"),
                    description: text_of(row, "plant_description"),
                })
            })
            .collect();

        let workshops = remote
            .select_all("workshop_tasks", &Query::new().select("id, task"))?
            .iter()
            .filter_map(|row| Some((id_of(row)?, text_of(row, "task"))))
            .filter(|(_, task)| !task.is_empty())
            .collect();

        let projects = remote
            .select_all("projects", &Query::new().select("id, short_description"))?
            .iter()
            .filter_map(|row| Some((id_of(row)?, text_of(row, "short_description"))))
            .collect();

        Ok(Self {
            plants,
            workshops,
            projects,
        })
    }

    /// Plant whose number or description equals `key`; a case-insensitive
    /// match is tried second when `ignore_case` is set.
    fn find_plant(&self, key: &str, ignore_case: bool) -> Option<&Value> {
        let lower = key.to_lowercase();
        self.plants
            .iter()
            .find(|p| plant_keys(p).iter().any(|k| !k.is_empty() && *k == key))
            .or_else(|| {
                self.plants.iter().find(|p| {
                    ignore_case && plant_keys(p).iter().any(|k| !k.is_empty() && k.to_lowercase() == lower)
                })
            })
            .map(|p| &p.id)
    }

    /// Plant for a section: direct match, then `Fleet No <n>`.
    fn plant_for_section(&self, section: &str, ignore_case: bool) -> Option<&Value> {
        self.find_plant(section, ignore_case).or_else(|| {
            fleet_number(section).and_then(|number| self.find_plant(number, ignore_case))
        })
    }

    /// Plant by its fleet number only (Plant and Mob columns).
    fn plant_by_number(&self, number: &str) -> Option<&Value> {
        self.plants
            .iter()
            .find(|p| !p.number.is_empty() && p.number == number)
            .map(|p| &p.id)
    }

    fn workshop_for_section(&self, section: &str, ignore_case: bool) -> Option<&Value> {
        self.workshops
            .iter()
            .find(|(_, task)| task == section)
            .or_else(|| {
                let lower = section.to_lowercase();
                self.workshops
                    .iter()
                    .find(|(_, task)| ignore_case && task.to_lowercase() == lower)
            })
            .map(|(id, _)| id)
    }

    fn resolve(&self, section: Option<&str>) -> Target {
        let Some(section) = section else {
            return Target::Unmatched;
        };
        if let Some(id) = self.plant_for_section(section, false) {
            return Target::Plant(id.clone());
        }
        if let Some(id) = self.workshop_for_section(section, false) {
            return Target::Workshop(id.clone());
        }
        self.projects
            .iter()
            .find(|(_, short)| short == section)
            .map(|(id, _)| Target::Project(id.clone()))
            .unwrap_or(Target::Unmatched)
    }
}

// ============================================================================
// IMPORT
// ============================================================================

/// Settings for one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Only these employees are imported when set.
    pub selected: Option<HashSet<String>>,
    /// Send only the core columns.
    pub minimal: bool,
    /// Report what would be inserted without writing.
    pub diagnose: bool,
}

/// Counters for an import run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub rows_read: usize,
    pub inserted: usize,
    pub breaks: usize,
    pub used_fleet: usize,
    pub mobilised_fleet: usize,
    pub skipped_short: usize,
    pub skipped_placeholder: usize,
    pub skipped_not_selected: usize,
    pub skipped_unknown_employee: usize,
    pub skipped_no_date: usize,
    pub skipped_no_hours: usize,
    pub skipped_duplicate: usize,
    pub errors: Vec<String>,
}

type DupKey = (String, String, String);

/// Key identifying a period already in the table. Stored start times vary
/// in suffix (`.000Z`, `+00:00`), so they are cut to seconds.
fn dup_key(user_id: &str, work_date: &str, start: Option<&str>) -> Option<DupKey> {
    let start = start.map(str::trim).filter(|s| !s.is_empty())?;
    if user_id.is_empty() || work_date.is_empty() {
        return None;
    }
    let date = work_date.get(..10).unwrap_or(work_date).to_string();
    let start = match start.get(..19) {
        Some(head) => format!("{}Z", head.replace(' ', "T")),
        None if start.ends_with('Z') => start.to_string(),
        None => format!("{start}Z"),
    };
    Some((user_id.to_string(), date, start))
}

struct Users<'a> {
    remote: &'a dyn Remote,
    cache: HashMap<String, Option<Value>>,
}

impl<'a> Users<'a> {
    fn new(remote: &'a dyn Remote) -> Self {
        Self {
            remote,
            cache: HashMap::new(),
        }
    }

    /// `user_id` for a display name, looked up once.
    fn resolve(&mut self, name: &str) -> Result<Option<Value>> {
        if let Some(hit) = self.cache.get(name) {
            return Ok(hit.clone());
        }
        let rows = self.remote.select(
            "users_setup",
            &Query::new()
                .select("user_id")
                .eq("display_name", name)
                .limit(1),
        )?;
        let user_id = rows
            .first()
            .and_then(|r| r.get("user_id"))
            .filter(|v| !v.is_null())
            .cloned();
        if user_id.is_none() {
            debug!("No users_setup entry for {:?}", name);
        }
        self.cache.insert(name.to_string(), user_id.clone());
        Ok(user_id)
    }

    fn known_ids(&self) -> Vec<String> {
        self.cache.values().flatten().map(cell_text).collect()
    }
}

fn is_selected(options: &ImportOptions, name: &str) -> bool {
    options.selected.as_ref().is_none_or(|s| s.contains(name))
}

/// Keys of periods already stored for these users within the date range.
fn existing_keys(
    remote: &dyn Remote,
    user_ids: &[String],
    range: (NaiveDate, NaiveDate),
) -> Result<HashSet<DupKey>> {
    let query = Query::new()
        .select("user_id, work_date, start_time")
        .gte("work_date", range.0)
        .lte("work_date", range.1)
        .in_list("user_id", user_ids);

    Ok(remote
        .select_all(TIME_PERIODS, &query)?
        .iter()
        .filter_map(|row| {
            let start = row.get("start_time").filter(|v| !v.is_null()).map(cell_text);
            dup_key(
                &text_of(row, "user_id"),
                &text_of(row, "work_date"),
                start.as_deref(),
            )
        })
        .collect())
}

fn timestamp(date: NaiveDate, time: NaiveTime) -> String {
    date.and_time(time).format(TIMESTAMP).to_string()
}

fn format_stamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP).to_string()
}

/// Import sheet rows as time periods.
///
/// Rows are skipped, in order, when: too short, a placeholder employee,
/// not selected, unknown employee, no date, no worked hours, or already
/// imported. Insert failures are recorded per row and the run continues.
///
/// # Errors
/// Fails only when the reference tables cannot be read.
pub fn import_rows(
    remote: &dyn Remote,
    rows: &[SheetRow],
    options: &ImportOptions,
) -> Result<ImportOutcome> {
    let mut outcome = ImportOutcome {
        rows_read: rows.len(),
        ..ImportOutcome::default()
    };
    let directory = Directory::load(remote)?;
    let mut users = Users::new(remote);

    let names: BTreeSet<&str> = rows
        .iter()
        .filter(|r| r.width() >= MIN_CELLS)
        .filter_map(SheetRow::employee)
        .filter(|n| is_selected(options, n))
        .collect();
    for name in &names {
        users.resolve(name)?;
    }
    info!("Employees to import: {}", names.len());

    let dates: Vec<NaiveDate> = rows
        .iter()
        .filter(|r| r.width() >= MIN_CELLS)
        .filter_map(|r| r.cell(col::DATE).and_then(parse_date))
        .collect();
    let user_ids = users.known_ids();
    let mut seen = match (dates.iter().min(), dates.iter().max()) {
        (Some(&first), Some(&last)) if !user_ids.is_empty() => {
            existing_keys(remote, &user_ids, (first, last)).unwrap_or_else(|e| {
                warn!("Could not load existing time periods: {}", e);
                HashSet::new()
            })
        }
        _ => HashSet::new(),
    };
    debug!("{} existing time periods in range", seen.len());

    for row in rows {
        if row.width() < MIN_CELLS {
            outcome.skipped_short += 1;
            continue;
        }
        let Some(name) = row.cell(col::EMPLOYEE) else {
            outcome.skipped_unknown_employee += 1;
            continue;
        };
        if is_site_placeholder(name) {
            outcome.skipped_placeholder += 1;
            continue;
        }
        if !is_selected(options, name) {
            outcome.skipped_not_selected += 1;
            continue;
        }
        let Some(user_id) = users.resolve(name)? else {
            outcome.skipped_unknown_employee += 1;
            continue;
        };

        let Some(work_date) = row.cell(col::DATE).and_then(parse_date) else {
            debug!("Row {}: no date parsed from {:?}", row.line, row.cell(col::DATE));
            outcome.skipped_no_date += 1;
            continue;
        };
        if row.cell(col::HOURS).map(parse_hours).unwrap_or(0) <= 0 {
            debug!("Row {}: {} skipped, no hours", row.line, work_date);
            outcome.skipped_no_hours += 1;
            continue;
        }

        let start = row.cell(col::START).and_then(parse_time);
        let finish = row.cell(col::FINISH).and_then(parse_time);
        let start_iso = start.map(|t| timestamp(work_date, t));
        let finish_iso = finish.map(|t| timestamp(work_date, t));
        let work_date_str = work_date.format("%Y-%m-%d").to_string();

        let key = dup_key(&cell_text(&user_id), &work_date_str, start_iso.as_deref());
        if key.as_ref().is_some_and(|k| seen.contains(k)) {
            outcome.skipped_duplicate += 1;
            continue;
        }

        let target = directory.resolve(row.cell(col::SECTION));
        let payload = build_payload(row, &user_id, &work_date_str, start_iso, finish_iso, &target, options.minimal);

        if options.diagnose {
            info!(
                "Row {}: {} {}-{} | {} / {} -> {} | would insert",
                row.line,
                work_date,
                start.map(|t| t.to_string()).unwrap_or_default(),
                finish.map(|t| t.to_string()).unwrap_or_default(),
                row.cell(col::CONTRACT).unwrap_or("-"),
                row.cell(col::SECTION).unwrap_or("-"),
                target.describe()
            );
            outcome.inserted += 1;
            continue;
        }

        let period_id = match remote.insert(TIME_PERIODS, &[payload]) {
            Ok(stored) => match stored.first().and_then(id_of) {
                Some(id) => id,
                None => {
                    outcome
                        .errors
                        .push(format!("Row {}: insert returned no data", row.line));
                    continue;
                }
            },
            Err(e) => {
                warn!("API error (row {}): {}", row.line, e);
                outcome
                    .errors
                    .push(format!("Row {} ({}): {}", row.line, work_date, e));
                continue;
            }
        };
        outcome.inserted += 1;
        if let Some(key) = key {
            seen.insert(key);
        }

        let break_minutes = row.cell(col::BREAK).map(parse_minutes).unwrap_or(0);
        if let Err(e) = insert_details(
            remote,
            &directory,
            row,
            &period_id,
            work_date,
            break_minutes,
            (start, finish),
            &mut outcome,
        ) {
            warn!("API error (row {}): {}", row.line, e);
            outcome
                .errors
                .push(format!("Row {} ({}): {}", row.line, work_date, e));
        }
    }

    Ok(outcome)
}

fn build_payload(
    row: &SheetRow,
    user_id: &Value,
    work_date: &str,
    start: Option<String>,
    finish: Option<String>,
    target: &Target,
    minimal: bool,
) -> Value {
    let mut payload = Map::new();
    payload.insert("user_id".into(), user_id.clone());
    payload.insert("work_date".into(), json!(work_date));
    payload.insert("start_time".into(), json!(start));
    payload.insert("finish_time".into(), json!(finish));
    payload.insert("status".into(), json!("imported"));

    if !minimal {
        let travel = row.cell(col::TRAVEL).map(parse_minutes).unwrap_or(0);
        let misc = row.cell(col::MISC).and_then(parse_int).unwrap_or(0);
        let on_call = row.cell(col::ON_CALL).is_some_and(parse_on_call);

        payload.insert("submitted_by".into(), user_id.clone());
        payload.insert(
            "submitted_at".into(),
            json!(Utc::now().format(TIMESTAMP).to_string()),
        );
        payload.insert("travel_to_site_min".into(), json!(travel));
        payload.insert("travel_from_site_min".into(), json!(0));
        payload.insert("on_call".into(), json!(on_call));
        payload.insert("misc_allowance_min".into(), json!(misc));
        payload.insert("revision_number".into(), json!(0));
    }

    match target {
        Target::Plant(id) => payload.insert("large_plant_id".into(), id.clone()),
        Target::Workshop(id) => payload.insert("workshop_tasks_id".into(), id.clone()),
        Target::Project(id) => payload.insert("project_id".into(), id.clone()),
        Target::Unmatched => None,
    };

    if !minimal {
        if let Some(material) = row.cell(col::MATERIAL) {
            payload.insert("concrete_mix_type".into(), json!(material));
        }
        if let Some(qty) = row.cell(col::QUANTITY).and_then(parse_number) {
            payload.insert("concrete_qty".into(), json!(qty));
        }
    }

    Value::Object(payload)
}

/// Breaks and fleet rows for a stored period.
#[allow(clippy::too_many_arguments)]
fn insert_details(
    remote: &dyn Remote,
    directory: &Directory,
    row: &SheetRow,
    period_id: &Value,
    work_date: NaiveDate,
    break_minutes: i64,
    (start, finish): (Option<NaiveTime>, Option<NaiveTime>),
    outcome: &mut ImportOutcome,
) -> Result<()> {
    for slot in plan_breaks(work_date, break_minutes, start, finish) {
        remote.insert(
            BREAKS,
            &[json!({
                "time_period_id": period_id,
                "break_start": format_stamp(slot.start),
                "break_finish": format_stamp(slot.finish),
                "display_order": slot.display_order,
            })],
        )?;
        outcome.breaks += 1;
    }

    let fleet = [(USED_FLEET, col::PLANT), (MOBILISED_FLEET, col::MOB)];
    for (table, columns) in fleet {
        let first = *columns.start();
        for idx in columns {
            let Some(plant_id) = row.cell(idx).and_then(|n| directory.plant_by_number(n)) else {
                continue;
            };
            remote.insert(
                table,
                &[json!({
                    "time_period_id": period_id,
                    "large_plant_id": plant_id,
                    "display_order": idx - first,
                })],
            )?;
            if table == USED_FLEET {
                outcome.used_fleet += 1;
            } else {
                outcome.mobilised_fleet += 1;
            }
        }
    }
    Ok(())
}

// ============================================================================
// FIX-UP OF EARLIER IMPORTS
// ============================================================================

/// Counters for a fix-up run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    /// Imported periods booked to a project.
    pub examined: usize,
    pub updated_plant: usize,
    pub updated_workshop: usize,
    /// Project descriptions that matched neither plant nor task.
    pub unmatched: BTreeSet<String>,
}

/// Move imported periods booked to a project whose short description names
/// a plant or workshop task onto that plant or task.
pub fn fix_imported(remote: &dyn Remote) -> Result<FixOutcome> {
    let periods = remote.select_all(
        TIME_PERIODS,
        &Query::new()
            .select("id, project_id")
            .eq("status", "imported")
            .not_null("project_id"),
    )?;
    let mut outcome = FixOutcome {
        examined: periods.len(),
        ..FixOutcome::default()
    };
    if periods.is_empty() {
        return Ok(outcome);
    }

    let directory = Directory::load(remote)?;
    let descriptions: HashMap<String, &str> = directory
        .projects
        .iter()
        .map(|(id, short)| (cell_text(id), short.as_str()))
        .collect();

    for period in &periods {
        let (Some(period_id), Some(project_id)) = (
            id_of(period),
            period.get("project_id").filter(|v| !v.is_null()),
        ) else {
            continue;
        };
        let short = descriptions
            .get(&cell_text(project_id))
            .copied()
            .unwrap_or("");
        if short.is_empty() {
            outcome.unmatched.insert("(empty)".to_string());
            continue;
        }

        let (column, id) = if let Some(id) = directory.plant_for_section(short, true) {
            ("large_plant_id", id)
        } else if let Some(id) = directory.workshop_for_section(short, true) {
            ("workshop_tasks_id", id)
        } else {
            outcome.unmatched.insert(short.to_string());
            continue;
        };

        let mut patch = Map::new();
        patch.insert(column.to_string(), id.clone());
        patch.insert("project_id".to_string(), Value::Null);
        remote.update(TIME_PERIODS, &Query::new().eq("id", cell_text(&period_id)), &Value::Object(patch))?;

        if column == "large_plant_id" {
            outcome.updated_plant += 1;
        } else {
            outcome.updated_workshop += 1;
        }
    }

    Ok(outcome)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryRemote;

    fn remote() -> MemoryRemote {
        MemoryRemote::new()
            .with_rows(
                "users_setup",
                vec![
                    json!({"user_id": "u-1", "display_name": "Bland, David"}),
                    json!({"user_id": "u-2", "display_name": "Murphy"}),
                ],
            )
            .with_rows(
                "large_plant",
                vec![
                    json!({"id": "p-100", "plant_no": "100", "plant_description": "Excavator 100"}),
                    json!({"id": "p-205", "plant_no": "205", "plant_description": "Dumper"}),
                ],
            )
            .with_rows("workshop_tasks", vec![json!({"id": "w-1", "task": "Yard"})])
            .with_rows(
                "projects",
                vec![
                    json!({"id": "pr-1", "short_description": "Road Works"}),
                    json!({"id": "pr-2", "short_description": "fleet no 100"}),
                    json!({"id": "pr-3", "short_description": "yard"}),
                ],
            )
    }

    fn row(line: usize, cells: &[(usize, &str)]) -> SheetRow {
        let mut all = vec![String::new(); super::super::SHEET_WIDTH];
        for (idx, value) in cells {
            all[*idx] = value.to_string();
        }
        SheetRow::new(line, all)
    }

    fn work_row(line: usize, employee: &str, section: &str) -> SheetRow {
        row(
            line,
            &[
                (col::DATE, "46027"),
                (col::CONTRACT, "Acme"),
                (col::SECTION, section),
                (col::EMPLOYEE, employee),
                (col::START, "8:00"),
                (col::BREAK, "0:30"),
                (col::FINISH, "17:00"),
                (col::HOURS, "8:30"),
                (9, "100"),
                (10, "999"),
                (15, "205"),
                (col::MATERIAL, "C30"),
                (col::QUANTITY, "6.5"),
                (col::TRAVEL, "0:45"),
                (col::ON_CALL, "Yes"),
                (col::MISC, "15"),
            ],
        )
    }

    // --- Pure helper tests ---

    #[test]
    fn test_dup_key_normalizes_suffixes() {
        let a = dup_key("u-1", "2026-01-05", Some("2026-01-05T08:00:00.000Z"));
        let b = dup_key("u-1", "2026-01-05T00:00:00", Some("2026-01-05 08:00:00+00:00"));
        assert_eq!(a, b);
        assert_eq!(a.unwrap().2, "2026-01-05T08:00:00Z");
        assert_eq!(dup_key("u-1", "2026-01-05", None), None);
    }

    #[test]
    fn test_fleet_number() {
        assert_eq!(fleet_number("Fleet No 100"), Some("100"));
        assert_eq!(fleet_number("FLEET NO  42 "), Some("42"));
        assert_eq!(fleet_number("Fleet No "), None);
        assert_eq!(fleet_number("Fleet 100"), None);
    }

    #[test]
    fn test_directory_resolution_order() {
        let remote = remote();
        let directory = Directory::load(&remote).unwrap();

        assert_eq!(directory.resolve(Some("Dumper")), Target::Plant(json!("p-205")));
        assert_eq!(directory.resolve(Some("Fleet No 100")), Target::Plant(json!("p-100")));
        assert_eq!(directory.resolve(Some("Yard")), Target::Workshop(json!("w-1")));
        assert_eq!(directory.resolve(Some("Road Works")), Target::Project(json!("pr-1")));
        assert_eq!(directory.resolve(Some("road works")), Target::Unmatched);
        assert_eq!(directory.resolve(None), Target::Unmatched);
    }

    // --- Import tests ---

    #[test]
    fn test_import_full_row() {
        let remote = remote();
        let rows = vec![work_row(2, "Bland, David", "Road Works")];

        let outcome = import_rows(&remote, &rows, &ImportOptions::default()).unwrap();

        assert_eq!(outcome.inserted, 1);
        assert!(outcome.errors.is_empty());
        let periods = remote.rows(TIME_PERIODS);
        let period = &periods[0];
        assert_eq!(period["user_id"], "u-1");
        assert_eq!(period["work_date"], "2026-01-05");
        assert_eq!(period["start_time"], "2026-01-05T08:00:00.000Z");
        assert_eq!(period["finish_time"], "2026-01-05T17:00:00.000Z");
        assert_eq!(period["status"], "imported");
        assert_eq!(period["project_id"], "pr-1");
        assert_eq!(period["travel_to_site_min"], 45);
        assert_eq!(period["on_call"], true);
        assert_eq!(period["misc_allowance_min"], 15);
        assert_eq!(period["concrete_mix_type"], "C30");
        assert_eq!(period["concrete_qty"], 6.5);
        assert_eq!(period["submitted_by"], "u-1");

        let breaks = remote.rows(BREAKS);
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0]["break_start"], "2026-01-05T13:00:00.000Z");
        assert_eq!(breaks[0]["time_period_id"], period["id"]);

        // Plant 999 is unknown and ignored
        let used = remote.rows(USED_FLEET);
        assert_eq!(used.len(), 1);
        assert_eq!(used[0]["large_plant_id"], "p-100");
        assert_eq!(used[0]["display_order"], 0);
        let mobilised = remote.rows(MOBILISED_FLEET);
        assert_eq!(mobilised[0]["large_plant_id"], "p-205");
        assert_eq!(outcome.breaks, 1);
        assert_eq!(outcome.used_fleet, 1);
        assert_eq!(outcome.mobilised_fleet, 1);
    }

    #[test]
    fn test_import_minimal_payload() {
        let remote = remote();
        let rows = vec![work_row(2, "Murphy", "Fleet No 205")];
        let options = ImportOptions {
            minimal: true,
            ..ImportOptions::default()
        };

        import_rows(&remote, &rows, &options).unwrap();

        let period = &remote.rows(TIME_PERIODS)[0];
        assert_eq!(period["large_plant_id"], "p-205");
        assert!(period.get("submitted_by").is_none());
        assert!(period.get("concrete_qty").is_none());
    }

    #[test]
    fn test_import_skip_reasons() {
        let remote = remote();
        let no_hours = row(
            7,
            &[(col::DATE, "46027"), (col::EMPLOYEE, "Murphy"), (col::HOURS, "00:00")],
        );
        let rows = vec![
            SheetRow::new(2, vec!["46027".into(), "Acme".into()]),
            work_row(3, "Site 4", "Yard"),
            work_row(4, "Walsh", "Yard"),
            work_row(5, "Nobody", "Yard"),
            row(6, &[(col::EMPLOYEE, "Murphy"), (col::HOURS, "8:00")]),
            no_hours,
        ];
        let options = ImportOptions {
            selected: Some(["Murphy".to_string(), "Nobody".to_string()].into()),
            ..ImportOptions::default()
        };

        let outcome = import_rows(&remote, &rows, &options).unwrap();

        assert_eq!(outcome.rows_read, 6);
        assert_eq!(outcome.skipped_short, 1);
        assert_eq!(outcome.skipped_placeholder, 1);
        assert_eq!(outcome.skipped_not_selected, 1);
        assert_eq!(outcome.skipped_unknown_employee, 1);
        assert_eq!(outcome.skipped_no_date, 1);
        assert_eq!(outcome.skipped_no_hours, 1);
        assert_eq!(outcome.inserted, 0);
    }

    #[test]
    fn test_import_skips_duplicates() {
        let remote = remote().with_rows(
            TIME_PERIODS,
            vec![json!({
                "user_id": "u-2",
                "work_date": "2026-01-05",
                "start_time": "2026-01-05T08:00:00+00:00"
            })],
        );
        let rows = vec![
            work_row(2, "Murphy", "Yard"),
            work_row(3, "Bland, David", "Yard"),
            work_row(4, "Bland, David", "Yard"),
        ];

        let outcome = import_rows(&remote, &rows, &ImportOptions::default()).unwrap();

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.skipped_duplicate, 2);
        assert_eq!(remote.rows(TIME_PERIODS).len(), 2);
    }

    #[test]
    fn test_diagnose_writes_nothing() {
        let remote = remote();
        let rows = vec![work_row(2, "Murphy", "Yard")];
        let options = ImportOptions {
            diagnose: true,
            ..ImportOptions::default()
        };

        let outcome = import_rows(&remote, &rows, &options).unwrap();

        assert_eq!(outcome.inserted, 1);
        assert!(remote.rows(TIME_PERIODS).is_empty());
        assert!(remote.rows(BREAKS).is_empty());
    }

    #[test]
    fn test_insert_failure_is_recorded() {
        let remote = remote();
        remote.fail_inserts(TIME_PERIODS);
        let rows = vec![work_row(2, "Murphy", "Yard"), work_row(3, "Bland, David", "Yard")];

        let outcome = import_rows(&remote, &rows, &ImportOptions::default()).unwrap();

        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].starts_with("Row 2 (2026-01-05)"));
    }

    // --- Fix-up tests ---

    #[test]
    fn test_fix_imported_moves_references() {
        let remote = remote().with_rows(
            TIME_PERIODS,
            vec![
                json!({"id": "t-1", "status": "imported", "project_id": "pr-2"}),
                json!({"id": "t-2", "status": "imported", "project_id": "pr-3"}),
                json!({"id": "t-3", "status": "imported", "project_id": "pr-1"}),
                json!({"id": "t-4", "status": "submitted", "project_id": "pr-2"}),
            ],
        );

        let outcome = fix_imported(&remote).unwrap();

        assert_eq!(outcome.examined, 3);
        assert_eq!(outcome.updated_plant, 1);
        assert_eq!(outcome.updated_workshop, 1);
        assert!(outcome.unmatched.contains("Road Works"));

        let rows = remote.rows(TIME_PERIODS);
        assert_eq!(rows[0]["large_plant_id"], "p-100");
        assert!(rows[0]["project_id"].is_null());
        assert_eq!(rows[1]["workshop_tasks_id"], "w-1");
        assert_eq!(rows[2]["project_id"], "pr-1");
        assert_eq!(rows[3]["project_id"], "pr-2");
    }

    #[test]
    fn test_fix_imported_nothing_to_do() {
        let outcome = fix_imported(&remote()).unwrap();
        assert_eq!(outcome, FixOutcome::default());
    }
}
