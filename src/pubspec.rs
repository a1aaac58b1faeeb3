//! Bump caret-constrained dependencies in a `pubspec.yaml` to the latest
//! published versions.
//!
//! Only `name: ^version` entries are touched; the rest of the file is
//! preserved byte for byte. SDK constraints under `environment:` are left
//! alone.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::error::{Error, Result};

/// Package registry queried by default.
pub const PUB_DEV: &str = "https://pub.dev";

const CARET: &str = ": ^";

/// A package moving from one version to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionChange {
    pub name: String,
    pub from: String,
    pub to: String,
}

// ============================================================================
// PURE FUNCTIONS (Manifest text)
// ============================================================================

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_version_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '+' | '-')
}

/// Whether the line holding `pos` is nested under the top-level
/// `environment:` key.
fn in_environment_block(text: &str, pos: usize) -> bool {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    if line_start == pos {
        return false;
    }
    text[..line_start]
        .lines()
        .rev()
        .find(|line| {
            !line.trim().is_empty() && !line.starts_with([' ', '\t']) && !line.starts_with('#')
        })
        .is_some_and(|key| key.trim_end().trim_end_matches(':') == "environment")
}

/// Byte ranges of every dependency `name: ^version` occurrence.
fn caret_entries(text: &str) -> Vec<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let mut entries = Vec::new();
    let mut from = 0;

    while let Some(found) = text[from..].find(CARET) {
        let colon = from + found;
        from = colon + CARET.len();

        let name_start = text[..colon]
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_name_char(*c))
            .last()
            .map(|(i, _)| i);
        let version_end = text[from..]
            .char_indices()
            .find(|(_, c)| !is_version_char(*c))
            .map(|(i, _)| from + i)
            .unwrap_or(text.len());

        match name_start {
            Some(start) if version_end > from && !in_environment_block(text, start) => {
                entries.push((start..colon, from..version_end))
            }
            _ => {}
        }
    }
    entries
}

/// Every `name: ^version` dependency, first occurrence of a name wins.
pub fn parse_caret_dependencies(text: &str) -> Vec<(String, String)> {
    let mut deps: Vec<(String, String)> = Vec::new();
    for (name, version) in caret_entries(text) {
        let name = &text[name];
        if deps.iter().all(|(n, _)| n != name) {
            deps.push((name.to_string(), text[version].to_string()));
        }
    }
    deps
}

/// Rewrite the version of each listed package.
pub fn apply_versions(text: &str, changes: &[VersionChange]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for (name, version) in caret_entries(text) {
        let Some(change) = changes.iter().find(|c| c.name == text[name.clone()]) else {
            continue;
        };
        out.push_str(&text[last..version.start]);
        out.push_str(&change.to);
        last = version.end;
    }
    out.push_str(&text[last..]);
    out
}

// ============================================================================
// VERSION SOURCES
// ============================================================================

/// Where the latest version of a package is looked up.
pub trait VersionSource {
    /// `None` when the package is unknown to the source.
    fn latest_version(&self, name: &str) -> Result<Option<String>>;
}

/// The pub.dev JSON API.
pub struct PubDevSource {
    client: Client,
    base: String,
}

impl PubDevSource {
    pub fn new() -> Result<Self> {
        Self::with_base(PUB_DEV)
    }

    pub fn with_base(base: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("housekeeper/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }
}

impl VersionSource for PubDevSource {
    fn latest_version(&self, name: &str) -> Result<Option<String>> {
        let url = format!("{}/api/packages/{}", self.base, name);
        debug!("GET {}", url);

        let response = self.client.get(&url).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Remote {
                status: response.status().as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let body: Value = response.json()?;
        Ok(body
            .pointer("/latest/version")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

// ============================================================================
// EFFECT FUNCTIONS
// ============================================================================

/// Look up each dependency; lookup failures leave the package unchanged.
pub fn plan_changes(deps: &[(String, String)], source: &dyn VersionSource) -> Vec<VersionChange> {
    let mut changes = Vec::new();
    for (name, current) in deps {
        match source.latest_version(name) {
            Ok(Some(latest)) if latest != *current => changes.push(VersionChange {
                name: name.clone(),
                from: current.clone(),
                to: latest,
            }),
            Ok(Some(_)) => debug!("{} is up to date ({})", name, current),
            Ok(None) => warn!("Could not find version info for {}", name),
            Err(e) => warn!("Lookup failed for {}: {}", name, e),
        }
    }
    changes
}

/// Bump every caret dependency in a manifest file.
///
/// # Errors
/// Fails if the file cannot be read or written.
pub fn bump_file(path: &Path, source: &dyn VersionSource, dry_run: bool) -> Result<Vec<VersionChange>> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let deps = parse_caret_dependencies(&text);
    info!("{} caret dependencies in {}", deps.len(), path.display());

    let changes = plan_changes(&deps, source);
    if !dry_run && !changes.is_empty() {
        fs::write(path, apply_versions(&text, &changes)).map_err(|e| Error::io(path, e))?;
    }
    Ok(changes)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const MANIFEST: &str = "\
name: site_diary
version: 1.2.0+7

environment:
  sdk: ^3.5.0

dependencies:
  flutter:
    sdk: flutter
  http: ^1.2.1
  supabase_flutter: ^2.5.6
  intl: 0.19.0
  my_http: ^0.1.0

dev_dependencies:
  http: ^0.13.0
  flutter_lints: ^4.0.0
";

    struct FixedSource(HashMap<&'static str, &'static str>);

    impl VersionSource for FixedSource {
        fn latest_version(&self, name: &str) -> Result<Option<String>> {
            if name == "flutter_lints" {
                return Err(Error::Remote {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(self.0.get(name).map(|v| v.to_string()))
        }
    }

    fn source() -> FixedSource {
        FixedSource(HashMap::from([
            ("sdk", "3.5.0"),
            ("http", "1.3.0"),
            ("supabase_flutter", "2.8.0"),
            ("my_http", "0.1.0"),
        ]))
    }

    #[test]
    fn test_parse_caret_dependencies() {
        let deps = parse_caret_dependencies(MANIFEST);
        let names: Vec<&str> = deps.iter().map(|(n, _)| n.as_str()).collect();

        assert_eq!(
            names,
            vec!["http", "supabase_flutter", "my_http", "flutter_lints"]
        );
        // First occurrence wins
        assert_eq!(deps[0].1, "1.2.1");
    }

    #[test]
    fn test_parse_version_with_build_suffix() {
        let deps = parse_caret_dependencies("  foo: ^1.0.0+2\n  bar: ^2.0.0-dev.1 # pinned\n");
        assert_eq!(deps[0], ("foo".to_string(), "1.0.0+2".to_string()));
        assert_eq!(deps[1], ("bar".to_string(), "2.0.0-dev.1".to_string()));
    }

    #[test]
    fn test_plan_changes_skips_current_and_failures() {
        let deps = parse_caret_dependencies(MANIFEST);
        let changes = plan_changes(&deps, &source());

        let names: Vec<&str> = changes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["http", "supabase_flutter"]);
        assert_eq!(changes[0].from, "1.2.1");
        assert_eq!(changes[0].to, "1.3.0");
    }

    #[test]
    fn test_apply_versions_exact_names_only() {
        let changes = vec![VersionChange {
            name: "http".to_string(),
            from: "1.2.1".to_string(),
            to: "1.3.0".to_string(),
        }];
        let updated = apply_versions(MANIFEST, &changes);

        assert!(updated.contains("  http: ^1.3.0\n  supabase_flutter"));
        // Every occurrence of the name is rewritten
        assert!(updated.contains("dev_dependencies:\n  http: ^1.3.0"));
        assert!(updated.contains("my_http: ^0.1.0"));
        assert!(updated.contains("intl: 0.19.0"));
        assert_eq!(updated.lines().count(), MANIFEST.lines().count());
    }

    #[test]
    fn test_bump_file_dry_run_and_write() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pubspec.yaml");
        fs::write(&path, MANIFEST).unwrap();

        let planned = bump_file(&path, &source(), true).unwrap();
        assert_eq!(planned.len(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), MANIFEST);

        bump_file(&path, &source(), false).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("supabase_flutter: ^2.8.0"));
    }

    #[test]
    fn test_environment_constraints_untouched() {
        let source = FixedSource(HashMap::from([("sdk", "3.9.0"), ("http", "1.3.0")]));
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pubspec.yaml");
        fs::write(&path, MANIFEST).unwrap();

        let changes = bump_file(&path, &source, false).unwrap();

        assert!(changes.iter().all(|c| c.name != "sdk"));
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("environment:\n  sdk: ^3.5.0\n"));
        assert!(written.contains("  http: ^1.3.0\n"));
    }

    #[test]
    fn test_bump_missing_file() {
        let err = bump_file(Path::new("/nonexistent/pubspec.yaml"), &source(), true).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
