//! Chat-history scraping from an editor's local SQLite state database.
//!
//! The database stores everything in a generic `ItemTable(key, value)`;
//! chat data is found with key-name and content heuristics.

use std::path::Path;

use chrono::Local;
use log::{debug, info};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Key-value table used by the editor's local storage.
pub const ITEM_TABLE: &str = "ItemTable";

/// Key substrings that suggest chat data.
pub const KEY_TERMS: &[&str] = &[
    "chat",
    "conversation",
    "message",
    "aichat",
    "interactive",
    "composer",
    "prompt",
    "generation",
];

/// Words whose presence in a value suggests chat content.
pub const CONTENT_INDICATORS: &[&str] = &[
    "message",
    "user",
    "assistant",
    "role",
    "content",
    "conversation",
    "chat",
    "prompt",
    "response",
    "text",
    "body",
    "messages",
    "thread",
];

/// Column names that make a table worth surveying.
const SURVEY_COLUMNS: &[&str] = &["key", "value", "data", "content", "message", "text"];

/// Keys with a known structure.
pub const COMPOSER_KEY: &str = "composer.composerData";
pub const PROMPTS_KEY: &str = "aiService.prompts";
pub const GENERATIONS_KEY: &str = "aiService.generations";
pub const SESSIONS_KEY: &str = "interactive.sessions";

const MIN_SCORED_LEN: usize = 50;
const MIN_INDICATORS: usize = 2;
const MIN_PLAIN_LEN: usize = 200;
const PLAIN_LIMIT: usize = 2000;
const PREVIEW_LEN: usize = 200;
const PROMPT_PREVIEWS: usize = 5;

// ============================================================================
// TYPES
// ============================================================================

/// A table with columns that may hold chat data.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub columns: Vec<String>,
    pub row_count: i64,
}

/// An `ItemTable` entry that looks like chat data.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCandidate {
    pub key: String,
    /// Number of content indicators found (0 for key-name matches).
    pub score: usize,
    pub key_match: bool,
    /// Parsed JSON, or the (possibly truncated) raw string.
    pub data: Value,
    pub is_json: bool,
}

/// Digest of the well-known keys.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ChatSummary {
    pub composers: Option<usize>,
    pub prompts: Option<usize>,
    pub prompt_previews: Vec<String>,
    pub generations: Option<usize>,
    pub sessions_present: bool,
}

/// Everything one scan found.
#[derive(Debug, Clone, Serialize)]
pub struct ChatScan {
    pub database_path: String,
    pub extracted_at: String,
    pub tables: Vec<TableSummary>,
    pub total_items_searched: usize,
    pub candidates: Vec<ChatCandidate>,
    pub summary: ChatSummary,
}

// ============================================================================
// PURE FUNCTIONS (Heuristics)
// ============================================================================

/// True when the key name suggests chat data.
pub fn key_matches(key: &str) -> bool {
    let lower = key.to_lowercase();
    KEY_TERMS.iter().any(|t| lower.contains(t))
}

/// Count distinct content indicators in a value.
pub fn indicator_score(value: &str) -> usize {
    let lower = value.to_lowercase();
    CONTENT_INDICATORS
        .iter()
        .filter(|t| lower.contains(*t))
        .count()
}

/// Classify one `ItemTable` entry.
pub fn classify(key: &str, value: &str) -> Option<ChatCandidate> {
    let parsed = serde_json::from_str::<Value>(value).ok();

    if value.len() > MIN_SCORED_LEN {
        let score = indicator_score(value);
        if score >= MIN_INDICATORS {
            return match parsed {
                Some(json) => Some(ChatCandidate {
                    key: key.to_string(),
                    score,
                    key_match: key_matches(key),
                    data: json,
                    is_json: true,
                }),
                None if value.len() > MIN_PLAIN_LEN => Some(ChatCandidate {
                    key: key.to_string(),
                    score,
                    key_match: key_matches(key),
                    data: Value::String(truncate(value, PLAIN_LIMIT)),
                    is_json: false,
                }),
                None => None,
            };
        }
    }

    if !value.is_empty() && key_matches(key) {
        let is_json = parsed.is_some();
        return Some(ChatCandidate {
            key: key.to_string(),
            score: 0,
            key_match: true,
            data: parsed.unwrap_or_else(|| Value::String(value.to_string())),
            is_json,
        });
    }

    None
}

/// Summarize the well-known keys among the candidates.
pub fn summarize(candidates: &[ChatCandidate]) -> ChatSummary {
    let find = |key: &str| candidates.iter().find(|c| c.key == key).map(|c| &c.data);
    let mut summary = ChatSummary::default();

    if let Some(data) = find(COMPOSER_KEY) {
        summary.composers = data
            .get("allComposers")
            .and_then(Value::as_array)
            .map(Vec::len);
    }
    if let Some(Value::Array(prompts)) = find(PROMPTS_KEY) {
        summary.prompts = Some(prompts.len());
        summary.prompt_previews = prompts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .take(PROMPT_PREVIEWS)
            .map(|t| truncate(t, PREVIEW_LEN))
            .collect();
    }
    if let Some(Value::Array(generations)) = find(GENERATIONS_KEY) {
        summary.generations = Some(generations.len());
    }
    summary.sessions_present = find(SESSIONS_KEY).is_some();
    summary
}

/// Truncate to at most `max` characters.
fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ============================================================================
// EFFECT FUNCTIONS (Database)
// ============================================================================

/// Scan a state database for chat data.
///
/// # Errors
/// Fails if the file is missing or is not a readable SQLite database.
pub fn scan_database(path: &Path) -> Result<ChatScan> {
    if !path.exists() {
        return Err(Error::Invalid(format!(
            "Database file not found: {}",
            path.display()
        )));
    }

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let table_names = list_tables(&conn)?;
    info!("Found {} tables in {}", table_names.len(), path.display());

    let tables = survey_tables(&conn, &table_names)?;

    let (total, mut candidates) = if table_names.iter().any(|t| t == ITEM_TABLE) {
        scan_item_table(&conn)?
    } else {
        info!("No {} in {}", ITEM_TABLE, path.display());
        (0, Vec::new())
    };

    candidates.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
    let summary = summarize(&candidates);

    Ok(ChatScan {
        database_path: path.display().to_string(),
        extracted_at: Local::now().to_rfc3339(),
        tables,
        total_items_searched: total,
        candidates,
        summary,
    })
}

fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

fn survey_tables(conn: &Connection, names: &[String]) -> Result<Vec<TableSummary>> {
    let mut summaries = Vec::new();

    for name in names {
        let quoted = quote_ident(name);
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({quoted})"))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let interesting = columns
            .iter()
            .any(|c| SURVEY_COLUMNS.contains(&c.to_lowercase().as_str()));
        if !interesting {
            continue;
        }

        let row_count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {quoted}"), [], |row| row.get(0))?;
        debug!("Table {} ({} rows): {}", name, row_count, columns.join(", "));

        summaries.push(TableSummary {
            name: name.clone(),
            columns,
            row_count,
        });
    }

    Ok(summaries)
}

fn scan_item_table(conn: &Connection) -> Result<(usize, Vec<ChatCandidate>)> {
    let mut stmt = conn.prepare(&format!("SELECT key, value FROM {ITEM_TABLE}"))?;
    let mut rows = stmt.query([])?;

    let mut total = 0;
    let mut candidates = Vec::new();
    while let Some(row) = rows.next()? {
        total += 1;
        let key = text_of(row.get_ref(0)?);
        let value = text_of(row.get_ref(1)?);
        if let Some(candidate) = classify(&key, &value) {
            candidates.push(candidate);
        }
    }

    info!("Searched {} items, {} candidates", total, candidates.len());
    Ok((total, candidates))
}

/// Decode TEXT or BLOB (lossy UTF-8); numbers are stringified.
fn text_of(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ============================================================================
// TESTS
// ============================================================================
