//! Client for tables on the hosted PostgREST endpoint.
//!
//! Structure:
//! - `Query`: filter builder rendered as PostgREST query parameters
//! - `Remote`: the operations commands need, on JSON rows
//! - `RestRemote`: blocking HTTP implementation
//! - `memory::MemoryRemote`: in-process implementation for tests

use std::cmp::Ordering;

use log::{debug, trace};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};

/// Rows per page when reading a whole table.
pub const PAGE_SIZE: usize = 1000;

// ============================================================================
// QUERY
// ============================================================================

/// One column condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String),
    Neq(String),
    Gte(String),
    Lte(String),
    In(Vec<String>),
    NotNull,
}

/// Columns, filters, ordering and paging for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    columns: Option<String>,
    filters: Vec<(String, Filter)>,
    /// Ascending sort column.
    order: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Comma-separated column list; all columns when unset.
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_string(), Filter::Eq(value.to_string())));
        self
    }

    pub fn neq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_string(), Filter::Neq(value.to_string())));
        self
    }

    pub fn gte(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_string(), Filter::Gte(value.to_string())));
        self
    }

    pub fn lte(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_string(), Filter::Lte(value.to_string())));
        self
    }

    pub fn in_list<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.filters.push((column.to_string(), Filter::In(values)));
        self
    }

    pub fn not_null(mut self, column: &str) -> Self {
        self.filters.push((column.to_string(), Filter::NotNull));
        self
    }

    pub fn order(mut self, column: &str) -> Self {
        self.order = Some(column.to_string());
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    /// Filters only, for update and delete requests.
    pub fn filters(&self) -> &[(String, Filter)] {
        &self.filters
    }

    /// Render as PostgREST query parameters.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(columns) = &self.columns {
            params.push(("select".to_string(), columns.replace(' ', "")));
        }
        for (column, filter) in &self.filters {
            let rendered = match filter {
                Filter::Eq(v) => format!("eq.{v}"),
                Filter::Neq(v) => format!("neq.{v}"),
                Filter::Gte(v) => format!("gte.{v}"),
                Filter::Lte(v) => format!("lte.{v}"),
                Filter::In(values) => {
                    let items: Vec<String> = values.iter().map(|v| quote_list_item(v)).collect();
                    format!("in.({})", items.join(","))
                }
                Filter::NotNull => "not.is.null".to_string(),
            };
            params.push((column.clone(), rendered));
        }
        if let Some(order) = &self.order {
            params.push(("order".to_string(), format!("{order}.asc")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        params
    }

    /// Evaluate the filters against one row.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|(column, filter)| {
            let cell = row.get(column).unwrap_or(&Value::Null);
            match filter {
                Filter::Eq(v) => !cell.is_null() && cell_text(cell) == *v,
                Filter::Neq(v) => !cell.is_null() && cell_text(cell) != *v,
                Filter::Gte(v) => !cell.is_null() && compare(cell, v) != Ordering::Less,
                Filter::Lte(v) => !cell.is_null() && compare(cell, v) != Ordering::Greater,
                Filter::In(values) => !cell.is_null() && values.contains(&cell_text(cell)),
                Filter::NotNull => !cell.is_null(),
            }
        })
    }
}

/// Values containing reserved characters are double-quoted inside `in.(...)`.
fn quote_list_item(value: &str) -> String {
    if value.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// The text PostgREST would compare a cell against.
pub fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn compare(cell: &Value, other: &str) -> Ordering {
    if let (Some(a), Ok(b)) = (cell.as_f64(), other.parse::<f64>()) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    cell_text(cell).as_str().cmp(other)
}

// ============================================================================
// REMOTE TRAIT
// ============================================================================

/// Row operations against named tables.
pub trait Remote {
    /// Rows matching the query (subject to server-side row limits).
    fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>>;

    /// Insert one or more rows; returns the stored rows with generated ids.
    fn insert(&self, table: &str, rows: &[Value]) -> Result<Vec<Value>>;

    /// Apply `patch` to every row matching the query's filters.
    fn update(&self, table: &str, query: &Query, patch: &Value) -> Result<()>;

    /// Delete every row matching the query's filters.
    fn delete(&self, table: &str, query: &Query) -> Result<()>;

    /// Every matching row, fetched page by page.
    ///
    /// Pages are ordered by `id` unless the query names an order, and
    /// reading stops at the first empty page so a server row cap below
    /// `PAGE_SIZE` still yields every row.
    fn select_all(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let mut query = query.clone();
        if query.order.is_none() {
            query.order = Some("id".to_string());
        }

        let mut rows = Vec::new();
        loop {
            let page = self.select(table, &query.clone().limit(PAGE_SIZE).offset(rows.len()))?;
            if page.is_empty() {
                return Ok(rows);
            }
            rows.extend(page);
        }
    }
}

// ============================================================================
// HTTP IMPLEMENTATION
// ============================================================================

/// PostgREST over blocking HTTP.
pub struct RestRemote {
    client: Client,
    config: RemoteConfig,
}

impl RestRemote {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    /// Turn a non-success status into `Error::Remote` with the response body.
    fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(Error::Remote {
            status: status.as_u16(),
            body,
        })
    }
}

impl Remote for RestRemote {
    fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let url = self.config.table_url(table);
        debug!("GET {} {:?}", url, query.to_params());

        let response = self
            .authorized(self.client.get(&url))
            .query(&query.to_params())
            .send()?;
        let rows = Self::check(response)?.json::<Vec<Value>>()?;
        trace!("{} rows from {}", rows.len(), table);
        Ok(rows)
    }

    fn insert(&self, table: &str, rows: &[Value]) -> Result<Vec<Value>> {
        let url = self.config.table_url(table);
        debug!("POST {} ({} rows)", url, rows.len());

        let response = self
            .authorized(self.client.post(&url))
            .header("Prefer", "return=representation")
            .json(rows)
            .send()?;
        Ok(Self::check(response)?.json::<Vec<Value>>()?)
    }

    fn update(&self, table: &str, query: &Query, patch: &Value) -> Result<()> {
        let url = self.config.table_url(table);
        let params = Query {
            filters: query.filters().to_vec(),
            ..Query::default()
        }
        .to_params();
        debug!("PATCH {} {:?}", url, params);

        let response = self
            .authorized(self.client.patch(&url))
            .query(&params)
            .json(patch)
            .send()?;
        Self::check(response)?;
        Ok(())
    }

    fn delete(&self, table: &str, query: &Query) -> Result<()> {
        let url = self.config.table_url(table);
        let params = Query {
            filters: query.filters().to_vec(),
            ..Query::default()
        }
        .to_params();
        debug!("DELETE {} {:?}", url, params);

        let response = self
            .authorized(self.client.delete(&url))
            .query(&params)
            .send()?;
        Self::check(response)?;
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY IMPLEMENTATION
// ============================================================================

#[cfg(test)]
pub(crate) mod memory {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use serde_json::{Value, json};

    use super::{Query, Remote, cell_text};
    use crate::error::{Error, Result};

    /// Tables held in memory; inserted rows get sequential integer ids.
    #[derive(Default)]
    pub struct MemoryRemote {
        tables: RefCell<BTreeMap<String, Vec<Value>>>,
        next_id: RefCell<u64>,
        /// Tables whose inserts fail, for error-path tests.
        failing: RefCell<Vec<String>>,
        /// Server-side cap on rows per response.
        max_rows: Option<usize>,
    }

    impl MemoryRemote {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a table, assigning ids to rows that lack one.
        pub fn with_rows(self, table: &str, rows: Vec<Value>) -> Self {
            for row in rows {
                self.store(table, row);
            }
            self
        }

        pub fn with_max_rows(mut self, n: usize) -> Self {
            self.max_rows = Some(n);
            self
        }

        pub fn fail_inserts(&self, table: &str) {
            self.failing.borrow_mut().push(table.to_string());
        }

        pub fn rows(&self, table: &str) -> Vec<Value> {
            self.tables.borrow().get(table).cloned().unwrap_or_default()
        }

        fn store(&self, table: &str, mut row: Value) -> Value {
            if row.get("id").is_none_or(Value::is_null) {
                let mut next = self.next_id.borrow_mut();
                *next += 1;
                if let Some(obj) = row.as_object_mut() {
                    obj.insert("id".to_string(), json!(*next));
                }
            }
            self.tables
                .borrow_mut()
                .entry(table.to_string())
                .or_default()
                .push(row.clone());
            row
        }
    }

    fn order_cells(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
        match (a.and_then(Value::as_f64), b.and_then(Value::as_f64)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => {
                let text = |v: Option<&Value>| v.map(cell_text).unwrap_or_default();
                text(a).cmp(&text(b))
            }
        }
    }

    impl Remote for MemoryRemote {
        fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
            let mut rows = self.rows(table);
            if let Some(column) = &query.order {
                rows.sort_by(|a, b| order_cells(a.get(column), b.get(column)));
            }
            let skip = query.offset.unwrap_or(0);
            let take = query
                .limit
                .unwrap_or(usize::MAX)
                .min(self.max_rows.unwrap_or(usize::MAX));
            Ok(rows
                .into_iter()
                .filter(|r| query.matches(r))
                .skip(skip)
                .take(take)
                .collect())
        }

        fn insert(&self, table: &str, rows: &[Value]) -> Result<Vec<Value>> {
            if self.failing.borrow().iter().any(|t| t == table) {
                return Err(Error::Remote {
                    status: 400,
                    body: format!("insert into {table} rejected"),
                });
            }
            Ok(rows.iter().map(|r| self.store(table, r.clone())).collect())
        }

        fn update(&self, table: &str, query: &Query, patch: &Value) -> Result<()> {
            let mut tables = self.tables.borrow_mut();
            for row in tables.entry(table.to_string()).or_default().iter_mut() {
                if !query.matches(row) {
                    continue;
                }
                if let (Some(obj), Some(changes)) = (row.as_object_mut(), patch.as_object()) {
                    for (k, v) in changes {
                        obj.insert(k.clone(), v.clone());
                    }
                }
            }
            Ok(())
        }

        fn delete(&self, table: &str, query: &Query) -> Result<()> {
            let mut tables = self.tables.borrow_mut();
            tables
                .entry(table.to_string())
                .or_default()
                .retain(|row| !query.matches(row));
            Ok(())
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
