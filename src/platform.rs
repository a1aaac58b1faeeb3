//! Platform lookups: default scan roots and default database locations.
//!
//! Structure:
//! - Constants: filesystem type names, known relative paths
//! - Pure functions: mount-table parsing and classification
//! - Effect functions: reading the live mount table

use std::path::{Path, PathBuf};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Linux mount table for the current process.
pub const MOUNT_TABLE: &str = "/proc/self/mounts";

/// Filesystem types served over the network.
pub const NETWORK_FS: &[&str] = &[
    "nfs",
    "nfs4",
    "cifs",
    "smb3",
    "smbfs",
    "sshfs",
    "fuse.sshfs",
    "9p",
    "afpfs",
    "davfs",
    "fuse.rclone",
    "ceph",
    "glusterfs",
];

/// Kernel and virtual filesystems that never hold user files.
pub const PSEUDO_FS: &[&str] = &[
    "proc",
    "sysfs",
    "devtmpfs",
    "devpts",
    "tmpfs",
    "securityfs",
    "debugfs",
    "tracefs",
    "mqueue",
    "hugetlbfs",
    "pstore",
    "bpf",
    "autofs",
    "configfs",
    "fusectl",
    "binfmt_misc",
    "overlay",
    "squashfs",
    "nsfs",
    "ramfs",
    "efivarfs",
    "rpc_pipefs",
];

/// Chat-history database relative to the user config directory.
pub const CHAT_DB_REL: &str = "Cursor/User/globalStorage/state.vscdb";

// ============================================================================
// TYPES
// ============================================================================

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

// ============================================================================
// PURE FUNCTIONS
// ============================================================================

/// Parse `/proc/mounts` formatted text.
///
/// Malformed lines are ignored. Octal escapes (`\040` for space) in the
/// mount point are decoded.
pub fn parse_mounts(text: &str) -> Vec<MountEntry> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                device: device.to_string(),
                mount_point: PathBuf::from(unescape_octal(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

pub fn is_network_fs(fs_type: &str) -> bool {
    NETWORK_FS.contains(&fs_type)
}

pub fn is_pseudo_fs(fs_type: &str) -> bool {
    PSEUDO_FS.contains(&fs_type) || fs_type.starts_with("cgroup")
}

/// Mount points of network filesystems.
pub fn network_roots(mounts: &[MountEntry]) -> Vec<PathBuf> {
    mounts
        .iter()
        .filter(|m| is_network_fs(&m.fs_type))
        .map(|m| m.mount_point.clone())
        .collect()
}

/// Mount points of every real (local or network) filesystem.
pub fn all_roots(mounts: &[MountEntry]) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = mounts
        .iter()
        .filter(|m| !is_pseudo_fs(&m.fs_type))
        .map(|m| m.mount_point.clone())
        .collect();
    roots.sort();
    roots.dedup();
    roots
}

/// Default chat database under a given config directory.
pub fn chat_db_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CHAT_DB_REL)
}

fn unescape_octal(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ============================================================================
// EFFECT FUNCTIONS
// ============================================================================

/// Read the live mount table (empty where there is none).
pub fn read_mounts() -> Vec<MountEntry> {
    std::fs::read_to_string(MOUNT_TABLE)
        .map(|text| parse_mounts(&text))
        .unwrap_or_default()
}

/// Network mounts on this machine.
pub fn network_mounts() -> Vec<PathBuf> {
    network_roots(&read_mounts())
}

/// Every real filesystem mounted on this machine.
pub fn local_and_network_mounts() -> Vec<PathBuf> {
    all_roots(&read_mounts())
}

/// Default chat-history database for the current user.
pub fn default_chat_db() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| chat_db_path(&dir))
}

// ============================================================================
// TESTS
// ============================================================================
