//! Archive container: one backup step's file contents plus its deletion
//! manifest.
//!
//! Layout: 8-byte magic, one compression-flag byte, then the bincode-encoded
//! container body (zstd-compressed when the flag is set). File contents are
//! stored whole. The deletion manifest rides along as a reserved entry named
//! `.manifest.json` holding `{"deleted_files": [...]}`; extraction and
//! metadata reads skip it.

use memmap2::Mmap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::BackupError;
use crate::snapshot::{FileMetadata, Snapshot};
use crate::Result;

pub const MAGIC: &[u8; 8] = b"INCBAK01";
pub const FORMAT_VERSION: u32 = 1;
/// Reserved entry name for the deletion manifest.
pub const MANIFEST_NAME: &str = ".manifest.json";

const FLAG_PLAIN: u8 = 0;
const FLAG_ZSTD: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Container {
    version: u32,
    entries: Vec<ArchiveEntry>,
}

/// One stored file: metadata recorded at backup time plus the content bytes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub path: String,
    /// Seconds since the Unix epoch, truncated to 2-second resolution.
    pub last_modified: i64,
    pub size: u64,
    pub crc: u32,
    pub data: Vec<u8>,
}

/// Payload of the reserved `.manifest.json` entry.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DeletionManifest {
    pub deleted_files: Vec<String>,
}

/// Memory-map a file for read-only access.
///
/// # Safety
/// The mapping is read-only. Callers must not concurrently truncate or
/// replace the underlying file while the `Mmap` is live.
fn mmap_file(path: &Path) -> Result<Mmap> {
    let file = std::fs::File::open(path).map_err(|source| BackupError::PathIo {
        path: path.to_path_buf(),
        source,
    })?;
    // SAFETY: We only read from this mapping; no concurrent modification of these files.
    unsafe {
        Mmap::map(&file).map_err(|source| BackupError::PathIo {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Write one archive: the listed files (content read from `source_root` by
/// each entry's relative path) plus the deletion manifest when
/// `deleted_paths` is non-empty. Contents are read concurrently; entries are
/// appended in the order given, one per file.
pub fn write_archive(
    source_root: &Path,
    files: &[FileMetadata],
    deleted_paths: &[String],
    output: &Path,
    compress: bool,
) -> Result<()> {
    let mut entries: Vec<ArchiveEntry> = files
        .par_iter()
        .map(|meta| -> Result<ArchiveEntry> {
            let full = source_root.join(&meta.path);
            let data = std::fs::read(&full).map_err(|source| BackupError::PathIo {
                path: full.clone(),
                source,
            })?;
            Ok(ArchiveEntry {
                path: meta.path.clone(),
                // container timestamps carry 2-second resolution
                last_modified: meta.last_modified & !1,
                size: data.len() as u64,
                crc: crc32fast::hash(&data),
                data,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if !deleted_paths.is_empty() {
        let manifest = DeletionManifest {
            deleted_files: deleted_paths.to_vec(),
        };
        let data = serde_json::to_vec(&manifest).map_err(|e| BackupError::Encode(e.to_string()))?;
        entries.push(ArchiveEntry {
            path: MANIFEST_NAME.to_string(),
            last_modified: 0,
            size: data.len() as u64,
            crc: crc32fast::hash(&data),
            data,
        });
    }

    let container = Container {
        version: FORMAT_VERSION,
        entries,
    };
    let encoded = bincode::serialize(&container).map_err(|e| BackupError::Encode(e.to_string()))?;

    let body = if compress {
        zstd::bulk::compress(&encoded, 3)?
    } else {
        encoded
    };

    let mut file = std::fs::File::create(output).map_err(|source| BackupError::PathIo {
        path: output.to_path_buf(),
        source,
    })?;
    file.write_all(MAGIC)?;
    file.write_all(&[if compress { FLAG_ZSTD } else { FLAG_PLAIN }])?;
    file.write_all(&body)?;
    file.flush()?;

    Ok(())
}

/// A parsed archive, ready for metadata reads, extraction, and the
/// deletion-ledger lookup.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    container: Container,
}

impl Archive {
    /// mmap the archive, check magic and compression flag, decode the body.
    /// Any malformation is fatal to the enclosing operation.
    pub fn load(path: &Path) -> Result<Self> {
        let file_len = std::fs::metadata(path)
            .map_err(|source| BackupError::PathIo {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if (file_len as usize) < MAGIC.len() + 1 {
            return Err(BackupError::InvalidArchive {
                path: path.to_path_buf(),
                reason: "truncated container".to_string(),
            });
        }

        let raw = mmap_file(path)?;

        if &raw[..MAGIC.len()] != MAGIC {
            return Err(BackupError::InvalidArchive {
                path: path.to_path_buf(),
                reason: "missing magic header".to_string(),
            });
        }

        let flag = raw[MAGIC.len()];
        let body = &raw[MAGIC.len() + 1..];

        let decoded = match flag {
            FLAG_PLAIN => bincode::deserialize::<Container>(body),
            FLAG_ZSTD => {
                let decoder =
                    zstd::Decoder::new(body).map_err(|e| BackupError::InvalidArchive {
                        path: path.to_path_buf(),
                        reason: format!("unreadable zstd body: {e}"),
                    })?;
                bincode::deserialize_from::<_, Container>(decoder)
            }
            other => {
                return Err(BackupError::InvalidArchive {
                    path: path.to_path_buf(),
                    reason: format!("unknown compression flag {other}"),
                })
            }
        };

        let container = decoded.map_err(|e| BackupError::InvalidArchive {
            path: path.to_path_buf(),
            reason: format!("undecodable container: {e}"),
        })?;

        if container.version != FORMAT_VERSION {
            return Err(BackupError::UnsupportedVersion {
                found: container.version,
                expected: FORMAT_VERSION,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            container,
        })
    }

    /// Snapshot built from entry metadata alone (size, truncated timestamp,
    /// stored CRC). The manifest entry is not a file and is skipped.
    pub fn metadata_snapshot(&self) -> Snapshot {
        self.container
            .entries
            .iter()
            .filter(|e| e.path != MANIFEST_NAME)
            .map(|e| {
                (
                    e.path.clone(),
                    FileMetadata {
                        path: e.path.clone(),
                        last_modified: e.last_modified,
                        size: e.size,
                        crc: Some(e.crc),
                    },
                )
            })
            .collect()
    }

    /// Paths this archive's manifest declares deleted; empty when the
    /// archive carries no manifest.
    pub fn deleted_files(&self) -> Result<Vec<String>> {
        let Some(entry) = self
            .container
            .entries
            .iter()
            .find(|e| e.path == MANIFEST_NAME)
        else {
            return Ok(Vec::new());
        };

        let manifest: DeletionManifest =
            serde_json::from_slice(&entry.data).map_err(|source| BackupError::Manifest {
                path: self.path.clone(),
                source,
            })?;
        Ok(manifest.deleted_files)
    }

    /// Extract every entry except the manifest into `destination`,
    /// overwriting files already present there. Returns the number of files
    /// written. A collision with an existing directory is fatal.
    pub fn extract_into(&self, destination: &Path) -> Result<usize> {
        let mut written = 0;
        for entry in &self.container.entries {
            if entry.path == MANIFEST_NAME {
                continue;
            }
            let full = destination.join(&entry.path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).map_err(|source| BackupError::PathIo {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            std::fs::write(&full, &entry.data).map_err(|source| BackupError::PathIo {
                path: full.clone(),
                source,
            })?;
            written += 1;
        }
        Ok(written)
    }
}
