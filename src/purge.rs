//! Deletion of files marked in the ledger.
//!
//! Structure:
//! - Pure functions: deletion planning
//! - Effect functions: file removal

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use log::{debug, warn};

use crate::ledger::LedgerEntry;

// ============================================================================
// PURE FUNCTIONS (Planning)
// ============================================================================

/// What `dupes delete` is about to do.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Marked files that will be removed.
    pub to_delete: Vec<PathBuf>,
    /// Marked files left alone because every copy in their group is marked.
    pub protected: Vec<PathBuf>,
}

/// Split marked ledger rows into deletions and protected files.
///
/// A group whose rows are all marked would lose its last copy; those rows
/// are protected unless `allow_all_copies` is set. Rows without a group id
/// are never protected.
pub fn plan_deletion(entries: &[LedgerEntry], allow_all_copies: bool) -> DeletionPlan {
    let mut totals: HashMap<usize, (usize, usize)> = HashMap::new();
    for entry in entries {
        if let Some(id) = entry.group_id {
            let (rows, marked) = totals.entry(id).or_default();
            *rows += 1;
            if entry.marked {
                *marked += 1;
            }
        }
    }

    let mut plan = DeletionPlan::default();
    for entry in entries.iter().filter(|e| e.marked) {
        let wipes_group = entry
            .group_id
            .and_then(|id| totals.get(&id))
            .is_some_and(|(rows, marked)| rows == marked);

        if wipes_group && !allow_all_copies {
            plan.protected.push(entry.path.clone());
        } else {
            plan.to_delete.push(entry.path.clone());
        }
    }
    plan
}

// ============================================================================
// EFFECT FUNCTIONS (Actions)
// ============================================================================

/// Result of a deletion pass.
#[derive(Debug, Default)]
pub struct DeletionOutcome {
    pub deleted: usize,
    /// (path, reason) for every file that was not removed.
    pub failed: Vec<(PathBuf, String)>,
}

/// Remove each path that is a regular file; keep going on failure.
pub fn delete_files(paths: &[PathBuf]) -> DeletionOutcome {
    let mut outcome = DeletionOutcome::default();

    for path in paths {
        if !path.is_file() {
            outcome
                .failed
                .push((path.clone(), "not found or not a file".to_string()));
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                outcome.deleted += 1;
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                outcome.failed.push((path.clone(), e.to_string()));
            }
        }
    }

    outcome
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn entry(path: &str, group: Option<usize>, marked: bool) -> LedgerEntry {
        LedgerEntry {
            path: PathBuf::from(path),
            group_id: group,
            marked,
        }
    }

    fn create_test_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"content").unwrap();
        path
    }

    // --- Planning tests ---

    #[test]
    fn test_plan_deletes_marked_copies() {
        let entries = vec![
            entry("/a/keep.jpg", Some(1), false),
            entry("/b/dup.jpg", Some(1), true),
        ];
        let plan = plan_deletion(&entries, false);

        assert_eq!(plan.to_delete, vec![PathBuf::from("/b/dup.jpg")]);
        assert!(plan.protected.is_empty());
    }

    #[test]
    fn test_plan_protects_fully_marked_group() {
        let entries = vec![
            entry("/a/one.jpg", Some(1), true),
            entry("/b/two.jpg", Some(1), true),
            entry("/c/x.pdf", Some(2), false),
            entry("/d/x.pdf", Some(2), true),
        ];
        let plan = plan_deletion(&entries, false);

        assert_eq!(plan.to_delete, vec![PathBuf::from("/d/x.pdf")]);
        assert_eq!(plan.protected.len(), 2);
    }

    #[test]
    fn test_plan_allow_all_copies() {
        let entries = vec![
            entry("/a/one.jpg", Some(1), true),
            entry("/b/two.jpg", Some(1), true),
        ];
        let plan = plan_deletion(&entries, true);

        assert_eq!(plan.to_delete.len(), 2);
        assert!(plan.protected.is_empty());
    }

    #[test]
    fn test_plan_without_group_ids() {
        let entries = vec![entry("/a", None, true), entry("/b", None, false)];
        let plan = plan_deletion(&entries, false);

        assert_eq!(plan.to_delete, vec![PathBuf::from("/a")]);
    }

    // --- Effect tests ---

    #[test]
    fn test_delete_files_removes_and_reports() {
        let temp = TempDir::new().unwrap();
        let file = create_test_file(temp.path(), "dup.txt");
        let missing = temp.path().join("missing.txt");
        let dir = temp.path().join("folder");
        fs::create_dir(&dir).unwrap();

        let outcome = delete_files(&[file.clone(), missing.clone(), dir.clone()]);

        assert_eq!(outcome.deleted, 1);
        assert!(!file.exists());
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(outcome.failed[0].0, missing);
        assert_eq!(outcome.failed[0].1, "not found or not a file");
        assert!(dir.exists());
    }
}
