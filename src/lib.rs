//! Incremental directory backup.
//!
//! A backup run scans the live tree and the existing archive chain into two
//! snapshots, diffs them, and packages the added/changed files plus a
//! deletion manifest into a new archive. A restore replays an ordered chain
//! of such archives into a destination directory.

pub mod archive;
pub mod backup;
pub mod diff;
pub mod error;
pub mod restore;
pub mod scan;
pub mod snapshot;

pub use error::BackupError;

pub type Result<T> = std::result::Result<T, BackupError>;
