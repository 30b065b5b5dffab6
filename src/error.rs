use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the backup core. Each input-error category gets its own
/// kind so callers can log and exit appropriately.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}: {}", .path.display(), .source)]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to scan {}: {}", .path.display(), .reason)]
    Scan { path: PathBuf, reason: String },

    #[error("non-UTF-8 path: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("invalid archive {}: {}", .path.display(), .reason)]
    InvalidArchive { path: PathBuf, reason: String },

    #[error("unsupported archive version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("malformed deletion manifest in {}: {}", .path.display(), .source)]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("archive encoding failed: {0}")]
    Encode(String),

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
