use rayon::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

use crate::diff::CompareMode;
use crate::error::BackupError;
use crate::snapshot::{FileMetadata, Snapshot};
use crate::Result;

struct ScannedFile {
    relative_path: String,
    full_path: PathBuf,
    size: u64,
    last_modified: i64,
}

/// Scan a directory tree into a snapshot keyed by forward-slash relative
/// path. Fast mode records size and mtime only; accurate mode additionally
/// computes each file's CRC-32, parallelized across files. Either way the
/// result map is assembled deterministically.
pub fn scan_directory(root: &Path, mode: CompareMode) -> Result<Snapshot> {
    let root = root.canonicalize().map_err(|source| BackupError::PathIo {
        path: root.to_path_buf(),
        source,
    })?;

    let mut files: Vec<ScannedFile> = Vec::new();

    for entry in WalkDir::new(&root).min_depth(1) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        let full_path = entry.path().to_path_buf();
        let relative = full_path
            .strip_prefix(&root)
            .map_err(|_| BackupError::Scan {
                path: full_path.clone(),
                reason: "entry is outside the scan root".to_string(),
            })?;

        // Forward slashes keep paths comparable across platforms.
        let relative_path = relative
            .to_str()
            .ok_or_else(|| BackupError::NonUtf8Path(relative.to_path_buf()))?
            .replace('\\', "/");

        let meta = entry.metadata()?;
        let last_modified = meta
            .modified()
            .map_err(|source| BackupError::PathIo {
                path: full_path.clone(),
                source,
            })?
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        files.push(ScannedFile {
            relative_path,
            full_path,
            size: meta.len(),
            last_modified,
        });
    }

    debug!(root = %root.display(), files = files.len(), ?mode, "scanned directory");

    let snapshot: Snapshot = match mode {
        CompareMode::Fast => files
            .into_iter()
            .map(|f| {
                (
                    f.relative_path.clone(),
                    FileMetadata {
                        path: f.relative_path,
                        last_modified: f.last_modified,
                        size: f.size,
                        crc: None,
                    },
                )
            })
            .collect(),
        CompareMode::Accurate => files
            .par_iter()
            .map(|f| -> Result<(String, FileMetadata)> {
                let crc = crc_file_streaming(&f.full_path)?;
                Ok((
                    f.relative_path.clone(),
                    FileMetadata {
                        path: f.relative_path.clone(),
                        last_modified: f.last_modified,
                        size: f.size,
                        crc: Some(crc),
                    },
                ))
            })
            .collect::<Result<Snapshot>>()?,
    };

    Ok(snapshot)
}

/// Stream a file through a CRC-32 hasher.
/// Reads in 256 KB chunks to keep syscall overhead down.
fn crc_file_streaming(path: &Path) -> Result<u32> {
    let mut file = std::fs::File::open(path).map_err(|source| BackupError::PathIo {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn paths_are_relative_with_forward_slashes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub/inner")).unwrap();
        fs::write(dir.path().join("top.txt"), b"top").unwrap();
        fs::write(dir.path().join("sub/inner/deep.txt"), b"deep").unwrap();

        let snapshot = scan_directory(dir.path(), CompareMode::Fast).unwrap();

        let keys: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["sub/inner/deep.txt", "top.txt"]);
        assert!(snapshot.values().all(|m| m.crc.is_none()));
        assert_eq!(snapshot["top.txt"].size, 3);
        assert!(snapshot["top.txt"].last_modified > 0);
    }

    #[test]
    fn accurate_mode_populates_checksums() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file.bin"), b"contents").unwrap();

        let snapshot = scan_directory(dir.path(), CompareMode::Accurate).unwrap();

        let meta = &snapshot["file.bin"];
        assert_eq!(meta.crc, Some(crc32fast::hash(b"contents")));
        assert_eq!(meta.size, 8);
    }

    #[test]
    fn empty_directory_yields_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let snapshot = scan_directory(dir.path(), CompareMode::Accurate).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn missing_root_is_an_input_error() {
        let err = scan_directory(Path::new("/nonexistent/incbak-scan-root"), CompareMode::Fast)
            .unwrap_err();
        assert!(matches!(err, BackupError::PathIo { .. }));
    }
}
