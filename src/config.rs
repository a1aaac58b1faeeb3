//! Configuration for commands that talk to the hosted database.
//!
//! Values come from CLI flags or the environment (see `main.rs`); nothing
//! is compiled in.

use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable holding the project URL.
pub const URL_ENV: &str = "SUPABASE_URL";

/// Environment variable holding the service-role key.
///
/// Bulk writes need the service-role key; the anon key is rejected by
/// row-level security.
pub const KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the hosted PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// Service-role API key.
    pub service_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Build from optional raw values, failing with the variable to set.
    pub fn from_parts(url: Option<String>, service_key: Option<String>) -> Result<Self> {
        let url = url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Config(format!("{URL_ENV} is not set (or pass --url)")))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::Config(format!("{URL_ENV} must be an http(s) URL: {url}")));
        }

        let service_key = service_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config(format!("{KEY_ENV} is not set (or pass --key)")))?;

        Ok(Self {
            url,
            service_key,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// REST endpoint for a table.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }
}
