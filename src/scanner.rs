//! Directory scanning for content duplicates.
//!
//! Two phases: walk the roots collecting candidate files, then hash every
//! file whose size collides with another one and group by digest.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::hash::hash_file;
use crate::types::{ContentHash, DuplicateGroup, DuplicateReport, FileRecord, ScanConfig};

/// Scan all roots for duplicate files.
pub fn find_duplicates(config: &ScanConfig) -> DuplicateReport {
    let files = collect_files(config, |_| {});
    group_duplicates(files, config, |_| {})
}

/// Walk every root and return regular files passing the size/extension filters.
///
/// Roots are canonicalized first, so one directory reached under two
/// spellings is walked once. Inaccessible entries are skipped; `on_file` is
/// called with the running count of accepted files.
pub fn collect_files(config: &ScanConfig, mut on_file: impl FnMut(usize)) -> Vec<FileRecord> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut files = Vec::new();

    for root in &config.roots {
        let root = match fs::canonicalize(root) {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping root {}: {}", root.display(), e);
                continue;
            }
        };

        let mut walker = WalkDir::new(&root).follow_links(config.follow_symlinks);
        if let Some(max_depth) = config.max_depth {
            walker = walker.max_depth(max_depth);
        }

        for entry in walker.into_iter() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    debug!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            let size = metadata.len();
            if !passes_filters(entry.path(), size, config) {
                continue;
            }

            let path = entry.into_path();
            // Followed links can reach one file under several names.
            let key = if config.follow_symlinks {
                fs::canonicalize(&path).unwrap_or_else(|_| path.clone())
            } else {
                path.clone()
            };
            if !seen.insert(key) {
                continue;
            }

            files.push(FileRecord {
                path,
                size,
                modified: metadata.modified().ok(),
            });
            on_file(files.len());
        }
    }

    files
}

/// Hash size-colliding files in parallel and build the report.
///
/// `on_hashed` is called once per hashed file (from worker threads).
pub fn group_duplicates(
    files: Vec<FileRecord>,
    config: &ScanConfig,
    on_hashed: impl Fn(&Path) + Sync,
) -> DuplicateReport {
    let files_scanned = files.len();
    let candidates = size_collisions(files);

    let results: Vec<(FileRecord, io::Result<ContentHash>)> = candidates
        .into_par_iter()
        .map(|record| {
            let hash = hash_file(&record.path, config.algorithm);
            on_hashed(&record.path);
            (record, hash)
        })
        .collect();

    let files_hashed = results.len();
    let mut report = assemble_report(results);
    report.files_scanned = files_scanned;
    report.files_hashed = files_hashed;
    report
}

/// Number of files that would be hashed for this set (for progress bars).
pub fn count_size_collisions(files: &[FileRecord]) -> usize {
    let mut by_size: HashMap<u64, usize> = HashMap::new();
    for f in files {
        *by_size.entry(f.size).or_default() += 1;
    }
    by_size.values().filter(|&&n| n > 1).sum()
}

// ============================================================================
// INTERNAL
// ============================================================================

fn passes_filters(path: &Path, size: u64, config: &ScanConfig) -> bool {
    if size < config.min_size {
        return false;
    }
    if let Some(max) = config.max_size {
        if size > max {
            return false;
        }
    }
    if let Some(exts) = &config.extensions {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !exts.iter().any(|e| *e == ext) {
            return false;
        }
    }
    true
}

/// Keep only files whose size is shared with at least one other file.
fn size_collisions(files: Vec<FileRecord>) -> Vec<FileRecord> {
    let mut by_size: HashMap<u64, Vec<FileRecord>> = HashMap::new();
    for f in files {
        by_size.entry(f.size).or_default().push(f);
    }
    by_size
        .into_values()
        .filter(|v| v.len() > 1)
        .flatten()
        .collect()
}

fn assemble_report(results: Vec<(FileRecord, io::Result<ContentHash>)>) -> DuplicateReport {
    let mut report = DuplicateReport::default();
    let mut by_hash: HashMap<ContentHash, Vec<FileRecord>> = HashMap::new();

    for (record, result) in results {
        match result {
            Ok(hash) => by_hash.entry(hash).or_default().push(record),
            Err(e) => report.skipped.push((record.path, e.to_string())),
        }
    }

    let mut groups: Vec<(ContentHash, Vec<FileRecord>)> = by_hash
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(hash, mut files)| {
            files.sort_by(|a, b| a.path.cmp(&b.path));
            (hash, files)
        })
        .collect();
    groups.sort_by(|a, b| a.1[0].path.cmp(&b.1[0].path));

    for (idx, (hash, files)) in groups.into_iter().enumerate() {
        let group = DuplicateGroup {
            id: idx + 1,
            hash,
            files,
        };
        report.bytes_recoverable += group.reclaimable();
        report.groups.push(group);
    }

    report.skipped.sort();
    report
}

// ============================================================================
// TESTS
// ============================================================================
