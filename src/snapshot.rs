use std::collections::BTreeMap;

/// Point-in-time mapping of relative file path to metadata.
///
/// Directories are not represented. The ordered map makes assembly
/// deterministic no matter how the producing scan was parallelized.
pub type Snapshot = BTreeMap<String, FileMetadata>;

/// Observable state of a single file at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Relative path, forward-slash separated, never starting with a slash.
    /// Sole identity key within a snapshot.
    pub path: String,
    /// Seconds since the Unix epoch. Archive entries carry 2-second resolution.
    pub last_modified: i64,
    /// File size in bytes.
    pub size: u64,
    /// CRC-32 of the contents. `None` when the producing scan skipped
    /// checksums; always present for metadata read from an archive.
    pub crc: Option<u32>,
}
