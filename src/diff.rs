use clap::ValueEnum;

use crate::snapshot::{FileMetadata, Snapshot};

/// Comparison strategy: `Fast` trusts size and mtime alone, `Accurate`
/// additionally compares checksums when both sides carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompareMode {
    Fast,
    Accurate,
}

/// Classification of the difference between two snapshots. The three lists
/// are disjoint by construction: `added` and `modified` carry metadata from
/// the new snapshot, `deleted` from the old one.
#[derive(Debug, Default)]
pub struct Changes {
    pub added: Vec<FileMetadata>,
    pub modified: Vec<FileMetadata>,
    pub deleted: Vec<FileMetadata>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// The deletion ledger for the archive being produced: deleted entries
    /// projected to paths, sorted for reproducible output.
    pub fn deleted_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.deleted.iter().map(|m| m.path.clone()).collect();
        paths.sort();
        paths
    }
}

/// Compare an old and a new snapshot and classify every path as added,
/// modified, or deleted. Pure and deterministic; absence of a path on either
/// side is a normal case, never an error.
///
/// Both snapshots must use the same path-normalization convention, or every
/// entry degenerates into an add/delete pair.
///
/// In fast mode a content change that leaves size and mtime untouched goes
/// undetected; that is the documented cost of skipping checksums. Accurate
/// mode catches it through the CRC comparison.
pub fn compare_snapshots(old: &Snapshot, new: &Snapshot, mode: CompareMode) -> Changes {
    let mut changes = Changes::default();

    for (path, new_meta) in new {
        match old.get(path) {
            None => changes.added.push(new_meta.clone()),
            Some(old_meta) => {
                if is_modified(old_meta, new_meta, mode) {
                    changes.modified.push(new_meta.clone());
                }
            }
        }
    }

    for (path, old_meta) in old {
        if !new.contains_key(path) {
            changes.deleted.push(old_meta.clone());
        }
    }

    changes
}

/// A file counts as modified when its size changed, when its mtime moved by
/// more than one whole second (the tolerance absorbs the 2-second timestamp
/// resolution of archive containers and cross-platform mtime granularity),
/// or, in accurate mode, when both sides carry a CRC and the values differ.
/// An absent CRC on either side means "cannot compare" and skips that check.
fn is_modified(old: &FileMetadata, new: &FileMetadata, mode: CompareMode) -> bool {
    if old.size != new.size {
        return true;
    }
    if (old.last_modified - new.last_modified).abs() > 1 {
        return true;
    }
    if mode == CompareMode::Accurate {
        if let (Some(old_crc), Some(new_crc)) = (old.crc, new.crc) {
            return old_crc != new_crc;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn meta(path: &str, last_modified: i64, size: u64, crc: Option<u32>) -> FileMetadata {
        FileMetadata {
            path: path.to_string(),
            last_modified,
            size,
            crc,
        }
    }

    fn snapshot(entries: Vec<FileMetadata>) -> Snapshot {
        entries.into_iter().map(|m| (m.path.clone(), m)).collect()
    }

    fn paths(list: &[FileMetadata]) -> BTreeSet<&str> {
        list.iter().map(|m| m.path.as_str()).collect()
    }

    #[test]
    fn identical_snapshots_yield_no_changes() {
        let s = snapshot(vec![
            meta("a.txt", 1_000, 10, Some(0xDEAD)),
            meta("b/c.txt", 2_000, 20, None),
        ]);
        for mode in [CompareMode::Fast, CompareMode::Accurate] {
            let changes = compare_snapshots(&s, &s, mode);
            assert!(changes.is_empty(), "self-comparison must be empty in {mode:?}");
        }
    }

    #[test]
    fn classification_partitions_the_path_sets() {
        let old = snapshot(vec![
            meta("keep.txt", 1_000, 10, None),
            meta("gone.txt", 1_000, 5, None),
            meta("grown.txt", 1_000, 7, None),
        ]);
        let new = snapshot(vec![
            meta("keep.txt", 1_000, 10, None),
            meta("grown.txt", 1_000, 9, None),
            meta("fresh.txt", 1_000, 3, None),
        ]);

        let changes = compare_snapshots(&old, &new, CompareMode::Fast);

        let added = paths(&changes.added);
        let modified = paths(&changes.modified);
        let deleted = paths(&changes.deleted);

        assert_eq!(added, BTreeSet::from(["fresh.txt"]));
        assert_eq!(modified, BTreeSet::from(["grown.txt"]));
        assert_eq!(deleted, BTreeSet::from(["gone.txt"]));

        assert!(added.is_disjoint(&modified));
        assert!(added.is_disjoint(&deleted));
        assert!(modified.is_disjoint(&deleted));

        // added ∪ modified ∪ unchanged covers exactly the new path set, and
        // deleted covers exactly old − new.
        let new_paths: BTreeSet<&str> = new.keys().map(String::as_str).collect();
        let unchanged: BTreeSet<&str> = new_paths
            .iter()
            .copied()
            .filter(|p| !added.contains(p) && !modified.contains(p))
            .collect();
        let mut union = added.clone();
        union.extend(&modified);
        union.extend(&unchanged);
        assert_eq!(union, new_paths);

        let old_only: BTreeSet<&str> = old
            .keys()
            .map(String::as_str)
            .filter(|p| !new.contains_key(*p))
            .collect();
        assert_eq!(deleted, old_only);
    }

    #[test]
    fn one_second_drift_is_within_tolerance() {
        let old = snapshot(vec![meta("a", 1_000, 10, None)]);
        let new = snapshot(vec![meta("a", 1_001, 10, None)]);
        assert!(compare_snapshots(&old, &new, CompareMode::Fast).is_empty());
        assert!(compare_snapshots(&old, &new, CompareMode::Accurate).is_empty());
    }

    #[test]
    fn two_second_drift_is_modified() {
        let old = snapshot(vec![meta("a", 1_000, 10, None)]);
        let new = snapshot(vec![meta("a", 1_002, 10, None)]);
        assert_eq!(paths(&compare_snapshots(&old, &new, CompareMode::Fast).modified), BTreeSet::from(["a"]));
    }

    #[test]
    fn size_change_is_modified_in_both_modes() {
        let old = snapshot(vec![meta("a", 1_000, 10, Some(1))]);
        let new = snapshot(vec![meta("a", 1_000, 11, Some(1))]);
        for mode in [CompareMode::Fast, CompareMode::Accurate] {
            assert_eq!(compare_snapshots(&old, &new, mode).modified.len(), 1);
        }
    }

    #[test]
    fn crc_difference_only_counts_in_accurate_mode() {
        let old = snapshot(vec![meta("a", 1_000, 10, Some(1))]);
        let new = snapshot(vec![meta("a", 1_000, 10, Some(2))]);

        let fast = compare_snapshots(&old, &new, CompareMode::Fast);
        let accurate = compare_snapshots(&old, &new, CompareMode::Accurate);

        assert!(fast.modified.is_empty());
        assert_eq!(paths(&accurate.modified), BTreeSet::from(["a"]));

        // accurate can only ever find more modifications than fast
        assert!(paths(&fast.modified).is_subset(&paths(&accurate.modified)));
    }

    #[test]
    fn absent_crc_is_never_compared() {
        let with = snapshot(vec![meta("a", 1_000, 10, Some(2))]);
        let without = snapshot(vec![meta("a", 1_000, 10, None)]);

        assert!(compare_snapshots(&without, &with, CompareMode::Accurate).is_empty());
        assert!(compare_snapshots(&with, &without, CompareMode::Accurate).is_empty());
        assert!(compare_snapshots(&without, &without, CompareMode::Accurate).is_empty());
    }

    #[test]
    fn deleted_paths_are_sorted() {
        let old = snapshot(vec![
            meta("z.txt", 1_000, 1, None),
            meta("a.txt", 1_000, 1, None),
            meta("m/n.txt", 1_000, 1, None),
        ]);
        let new = Snapshot::new();

        let changes = compare_snapshots(&old, &new, CompareMode::Fast);
        assert_eq!(changes.deleted_paths(), vec!["a.txt", "m/n.txt", "z.txt"]);
    }
}
