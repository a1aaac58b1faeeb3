//! Copy files modified after a cutoff, preserving the folder structure.
//!
//! Destination folders are created only when a file lands in them, so the
//! copy never contains empty folders.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Settings for one copy run.
#[derive(Debug, Clone)]
pub struct CopyConfig {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Files must be modified strictly after this local time.
    pub cutoff: NaiveDateTime,
    /// Report what would be copied without touching the destination.
    pub dry_run: bool,
}

/// Counters for a copy run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    pub copied: usize,
    /// Files modified at or before the cutoff.
    pub skipped: usize,
    pub errors: usize,
    pub bytes: u64,
}

/// Copy every file under `source` newer than the cutoff.
///
/// # Errors
/// Fails only if the source is missing or not a directory; per-file
/// problems are logged and counted.
pub fn copy_since(config: &CopyConfig) -> Result<CopyOutcome> {
    let source = &config.source;
    if !source.exists() {
        return Err(Error::Invalid(format!(
            "Source path does not exist: {}",
            source.display()
        )));
    }
    if !source.is_dir() {
        return Err(Error::Invalid(format!(
            "Source path is not a directory: {}",
            source.display()
        )));
    }

    let cutoff = local_cutoff(config.cutoff)?;
    if !config.dry_run {
        fs::create_dir_all(&config.destination)
            .map_err(|e| Error::io(&config.destination, e))?;
    }

    let mut outcome = CopyOutcome::default();
    let walker = WalkDir::new(source).min_depth(1).sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error walking {}: {}", source.display(), e);
                outcome.errors += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let modified = match entry.metadata().map_err(io::Error::from).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) => {
                warn!("Could not check modification time for {}: {}", path.display(), e);
                outcome.errors += 1;
                continue;
            }
        };

        let stamp = format_time(modified);
        if modified <= cutoff {
            debug!("Skipped (before cutoff): {} (modified: {})", path.display(), stamp);
            outcome.skipped += 1;
            continue;
        }

        let relative = match path.strip_prefix(source) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let target = config.destination.join(relative);

        if config.dry_run {
            info!("Would copy: {} (modified: {})", relative.display(), stamp);
            outcome.copied += 1;
            continue;
        }

        match copy_preserving_mtime(path, &target, modified) {
            Ok(bytes) => {
                info!("Copied: {} (modified: {})", relative.display(), stamp);
                outcome.copied += 1;
                outcome.bytes += bytes;
            }
            Err(e) => {
                warn!("Error copying file {}: {}", path.display(), e);
                outcome.errors += 1;
            }
        }
    }

    Ok(outcome)
}

/// Interpret a naive cutoff in the local time zone.
fn local_cutoff(cutoff: NaiveDateTime) -> Result<SystemTime> {
    Local
        .from_local_datetime(&cutoff)
        .earliest()
        .map(SystemTime::from)
        .ok_or_else(|| Error::Invalid(format!("Cutoff {cutoff} does not exist in local time")))
}

fn copy_preserving_mtime(source: &Path, target: &Path, modified: SystemTime) -> io::Result<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = fs::copy(source, target)?;
    // The copy inherits the source mode, which may be read-only.
    File::open(target)?.set_modified(modified)?;
    Ok(bytes)
}

fn format_time(t: SystemTime) -> String {
    DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_with_mtime(path: &Path, content: &[u8], mtime: SystemTime) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn cutoff() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn after() -> SystemTime {
        local_cutoff(cutoff()).unwrap() + Duration::from_secs(86_400)
    }

    fn before() -> SystemTime {
        local_cutoff(cutoff()).unwrap() - Duration::from_secs(86_400)
    }

    fn setup() -> (TempDir, CopyConfig) {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        write_with_mtime(&source.join("new.jpg"), b"new", after());
        write_with_mtime(&source.join("old.jpg"), b"old", before());
        write_with_mtime(&source.join("week1/new2.jpg"), b"new2", after());
        write_with_mtime(&source.join("archive/old2.jpg"), b"old2", before());

        let config = CopyConfig {
            source,
            destination: temp.path().join("dst"),
            cutoff: cutoff(),
            dry_run: false,
        };
        (temp, config)
    }

    #[test]
    fn test_copies_only_newer_files() {
        let (_temp, config) = setup();
        let outcome = copy_since(&config).unwrap();

        assert_eq!(outcome.copied, 2);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.errors, 0);
        assert_eq!(outcome.bytes, 7);
        assert!(config.destination.join("new.jpg").exists());
        assert!(config.destination.join("week1/new2.jpg").exists());
        assert!(!config.destination.join("old.jpg").exists());
    }

    #[test]
    fn test_no_empty_folders_created() {
        let (_temp, config) = setup();
        copy_since(&config).unwrap();

        assert!(!config.destination.join("archive").exists());
    }

    #[test]
    fn test_preserves_modification_time() {
        let (_temp, config) = setup();
        copy_since(&config).unwrap();

        let copied = fs::metadata(config.destination.join("new.jpg"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(copied, after());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (_temp, config) = setup();
        let config = CopyConfig {
            dry_run: true,
            ..config
        };
        let outcome = copy_since(&config).unwrap();

        assert_eq!(outcome.copied, 2);
        assert!(!config.destination.exists());
    }

    #[test]
    fn test_missing_source_errors() {
        let temp = TempDir::new().unwrap();
        let config = CopyConfig {
            source: temp.path().join("missing"),
            destination: temp.path().join("dst"),
            cutoff: cutoff(),
            dry_run: false,
        };
        let err = copy_since(&config).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_source_file_errors() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        let config = CopyConfig {
            source: file,
            destination: temp.path().join("dst"),
            cutoff: cutoff(),
            dry_run: false,
        };
        let err = copy_since(&config).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[cfg(unix)]
    #[test]
    fn test_copies_read_only_source() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        let file = source.join("locked.pdf");
        write_with_mtime(&file, b"locked", after());
        fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).unwrap();

        let config = CopyConfig {
            source,
            destination: temp.path().join("dst"),
            cutoff: cutoff(),
            dry_run: false,
        };
        let outcome = copy_since(&config).unwrap();

        assert_eq!(outcome.copied, 1);
        assert_eq!(outcome.errors, 0);
        let target = config.destination.join("locked.pdf");
        let meta = fs::metadata(&target).unwrap();
        assert_eq!(meta.modified().unwrap(), after());
        assert_eq!(meta.permissions().mode() & 0o777, 0o444);
    }
}
