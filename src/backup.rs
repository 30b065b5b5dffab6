use std::path::{Path, PathBuf};
use tracing::info;

use crate::archive::{self, Archive};
use crate::diff::{self, CompareMode};
use crate::snapshot::{FileMetadata, Snapshot};
use crate::{scan, Result};

/// Counters reported after a backup run.
#[derive(Debug)]
pub struct BackupSummary {
    pub files_added: usize,
    pub files_modified: usize,
    pub files_deleted: usize,
    pub bytes_archived: u64,
}

/// Fold an ordered archive chain into the directory state it would restore
/// to: for each archive, oldest to newest, first drop the paths its manifest
/// declares deleted, then let its entries override earlier ones. Folding the
/// deletions in keeps the next increment minimal instead of re-listing
/// historical deletions.
pub fn read_chain_metadata(archives: &[PathBuf]) -> Result<Snapshot> {
    let mut state = Snapshot::new();
    for path in archives {
        let archive = Archive::load(path)?;
        for deleted in archive.deleted_files()? {
            state.remove(&deleted);
        }
        for (entry_path, meta) in archive.metadata_snapshot() {
            state.insert(entry_path, meta);
        }
    }
    Ok(state)
}

/// Create one incremental archive holding the difference between the source
/// directory and the state recorded by the existing chain.
///
/// The live scan and the chain-metadata read are independent read-only
/// computations, so they run concurrently before the comparison step.
pub async fn create_backup(
    source_dir: &Path,
    base: &Path,
    increments: &[PathBuf],
    output: &Path,
    mode: CompareMode,
    compress: bool,
) -> Result<BackupSummary> {
    let scan_root = source_dir.to_path_buf();
    let mut chain: Vec<PathBuf> = Vec::with_capacity(increments.len() + 1);
    chain.push(base.to_path_buf());
    chain.extend_from_slice(increments);

    let (new_state, old_state) = tokio::try_join!(
        tokio::task::spawn_blocking(move || scan::scan_directory(&scan_root, mode)),
        tokio::task::spawn_blocking(move || read_chain_metadata(&chain)),
    )?;
    let new_state = new_state?;
    let old_state = old_state?;

    let changes = diff::compare_snapshots(&old_state, &new_state, mode);

    let mut files_to_add: Vec<FileMetadata> = changes
        .added
        .iter()
        .chain(changes.modified.iter())
        .cloned()
        .collect();
    files_to_add.sort_by(|a, b| a.path.cmp(&b.path));
    let deleted_paths = changes.deleted_paths();

    info!(
        added = changes.added.len(),
        modified = changes.modified.len(),
        deleted = deleted_paths.len(),
        output = %output.display(),
        "writing incremental archive"
    );

    let bytes_archived: u64 = files_to_add.iter().map(|m| m.size).sum();

    archive::write_archive(source_dir, &files_to_add, &deleted_paths, output, compress)?;

    Ok(BackupSummary {
        files_added: changes.added.len(),
        files_modified: changes.modified.len(),
        files_deleted: deleted_paths.len(),
        bytes_archived,
    })
}
