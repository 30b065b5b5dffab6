use std::path::{Path, PathBuf};
use tracing::debug;

use crate::archive::Archive;
use crate::error::BackupError;
use crate::Result;

/// Counters reported after a restore run.
#[derive(Debug)]
pub struct RestoreSummary {
    pub archives_applied: usize,
    pub files_written: usize,
    pub files_deleted: usize,
}

/// Replay an ordered archive chain (oldest to newest) into `destination`.
///
/// Each archive is extracted in turn, later archives overwriting earlier
/// ones for any given path, and its own declared deletions are applied
/// immediately after its extraction. Scoping deletions to the archive that
/// declared them lets a later archive re-add a path an earlier one deleted;
/// within a single archive, extraction runs first, so a path the archive
/// both carries and declares deleted ends up deleted.
///
/// A malformed archive aborts the whole restore; files already extracted are
/// left in place. Removing a path that no archive ever wrote is a no-op.
pub fn restore_chain(archives: &[PathBuf], destination: &Path) -> Result<RestoreSummary> {
    std::fs::create_dir_all(destination).map_err(|source| BackupError::PathIo {
        path: destination.to_path_buf(),
        source,
    })?;

    let mut summary = RestoreSummary {
        archives_applied: 0,
        files_written: 0,
        files_deleted: 0,
    };

    for path in archives {
        let archive = Archive::load(path)?;

        let written = archive.extract_into(destination)?;
        summary.files_written += written;

        let mut removed = 0;
        for deleted in archive.deleted_files()? {
            let full = destination.join(&deleted);
            match std::fs::remove_file(&full) {
                Ok(()) => removed += 1,
                // already absent, e.g. never restored in the first place
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(BackupError::PathIo { path: full, source }),
            }
        }
        summary.files_deleted += removed;
        summary.archives_applied += 1;

        debug!(archive = %path.display(), files = written, deleted = removed, "applied archive");
    }

    Ok(summary)
}
