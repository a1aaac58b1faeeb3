//! Domain types for the duplicate finder.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Content identity: proof that two files are byte-identical.
///
/// Wraps a 32-byte digest (BLAKE3 or SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Returns the hash as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        hex_to_bytes(hex).map(ContentHash)
    }
}

impl Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        ContentHash::from_hex(&hex_str).map_err(serde::de::Error::custom)
    }
}

// Share paths need not be UTF-8; JSON gets the lossy form.
fn serialize_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

fn serialize_skipped<S: Serializer>(
    skipped: &[(PathBuf, String)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(skipped.len()))?;
    for (path, error) in skipped {
        seq.serialize_element(&(path.to_string_lossy(), error))?;
    }
    seq.end()
}

fn hex_to_bytes(hex: &str) -> Result<[u8; 32], String> {
    if hex.len() != 64 {
        return Err(format!("Expected 64 hex chars, got {}", hex.len()));
    }
    let mut bytes = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(chunk).map_err(|e| e.to_string())?;
        bytes[i] = u8::from_str_radix(s, 16).map_err(|e| e.to_string())?;
    }
    Ok(bytes)
}

// ============================================================================
// ENUMS
// ============================================================================

/// Digest used to compare file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable pretty output.
    #[default]
    Human,
    /// Machine-readable JSON.
    Json,
}

// ============================================================================
// STRUCTS
// ============================================================================

/// A regular file found during the walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    #[serde(serialize_with = "serialize_path")]
    pub path: PathBuf,
    pub size: u64,
    #[serde(skip)]
    pub modified: Option<SystemTime>,
}

/// Files sharing one content hash.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    /// 1-based, in report order.
    pub id: usize,
    pub hash: ContentHash,
    /// Sorted by path; always at least two entries.
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Bytes freed by keeping a single copy.
    pub fn reclaimable(&self) -> u64 {
        let size = self.files.first().map(|f| f.size).unwrap_or(0);
        size * (self.files.len().saturating_sub(1) as u64)
    }
}

/// Complete results of a duplicate scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
    /// Regular files that passed the filters.
    pub files_scanned: usize,
    /// Files whose size collided with another file and were hashed.
    pub files_hashed: usize,
    /// Total bytes recoverable by keeping one file per group.
    pub bytes_recoverable: u64,
    /// Files skipped due to read errors (path, error message).
    #[serde(serialize_with = "serialize_skipped")]
    pub skipped: Vec<(PathBuf, String)>,
}

impl DuplicateReport {
    /// Number of files across all groups.
    pub fn duplicate_files(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for duplicate scans.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Root directories to scan.
    pub roots: Vec<PathBuf>,
    /// Skip files smaller than this many bytes.
    pub min_size: u64,
    /// Skip files larger than this many bytes.
    pub max_size: Option<u64>,
    /// Lowercase extensions without the dot (None = all files).
    pub extensions: Option<Vec<String>>,
    pub algorithm: HashAlgorithm,
    /// Maximum directory depth (None = unlimited).
    pub max_depth: Option<usize>,
    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            min_size: 0,
            max_size: None,
            extensions: None,
            algorithm: HashAlgorithm::default(),
            max_depth: None,
            follow_symlinks: false,
        }
    }
}

impl ScanConfig {
    /// Normalize a comma-separated extension list (".JPG, png" -> ["jpg", "png"]).
    pub fn parse_extensions(list: &str) -> Option<Vec<String>> {
        let exts: Vec<String> = list
            .split(',')
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if exts.is_empty() { None } else { Some(exts) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip_through_serde() {
        let hash = ContentHash([0x0f; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json.len(), 66);
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_from_hex_rejects_short_input() {
        assert!(ContentHash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_parse_extensions_normalizes() {
        let exts = ScanConfig::parse_extensions(".JPG, png,,").unwrap();
        assert_eq!(exts, vec!["jpg".to_string(), "png".to_string()]);
        assert!(ScanConfig::parse_extensions(" , ").is_none());
    }

    #[test]
    fn test_group_reclaimable() {
        let record = |p: &str| FileRecord {
            path: PathBuf::from(p),
            size: 100,
            modified: None,
        };
        let group = DuplicateGroup {
            id: 1,
            hash: ContentHash([0; 32]),
            files: vec![record("/a"), record("/b"), record("/c")],
        };
        assert_eq!(group.reclaimable(), 200);
    }
}
