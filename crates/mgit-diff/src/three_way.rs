//! Three-way classification of walked paths for merging.
//!
//! For every path across (ours, theirs, base), decides whether the path was
//! added, deleted, modified, left unmodified, or modified on both sides
//! (a candidate for content-level merging). Only content-bearing entries
//! (blobs and symlinks) participate; directories recurse and gitlinks are
//! rejected.

use bstr::BString;
use mgit_hash::ObjectId;
use mgit_object::FileMode;
use mgit_odb::ObjectStore;
use mgit_repo::Repository;

use crate::walk::{WalkEntry, WalkSource, Walker};
use crate::DiffError;

/// One side's contribution to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSide {
    pub oid: ObjectId,
    pub mode: FileMode,
}

/// Classification of a path across (ours, theirs, base).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    Added,
    Deleted,
    Modified,
    Conflict,
    Unmodified,
}

/// One changed path in a three-way tree diff.
#[derive(Debug, Clone)]
pub struct MergeDiffEntry {
    pub path: BString,
    pub status: MergeStatus,
    pub ours: Option<ChangeSide>,
    pub theirs: Option<ChangeSide>,
    pub base: Option<ChangeSide>,
}

/// Classify a path from the presence and identity of its three sides.
///
/// Identity is (oid, mode): entries are equal only when both agree.
pub fn classify(
    ours: Option<&ChangeSide>,
    theirs: Option<&ChangeSide>,
    base: Option<&ChangeSide>,
) -> MergeStatus {
    match (ours, theirs, base) {
        (None, None, None) => MergeStatus::Unmodified,

        // Present on exactly one side.
        (Some(_), None, None) | (None, Some(_), None) => MergeStatus::Added,
        (None, None, Some(_)) => MergeStatus::Deleted,

        // One side removed what the base had.
        (None, Some(_), Some(_)) => MergeStatus::Deleted,
        (Some(_), None, Some(_)) => MergeStatus::Deleted,

        // Both sides added the path.
        (Some(o), Some(t), None) => {
            if o == t {
                MergeStatus::Added
            } else {
                MergeStatus::Conflict
            }
        }

        (Some(o), Some(t), Some(b)) => {
            if o == t {
                // Identical on both sides: either untouched or the same
                // change made twice, which merges cleanly.
                if o == b {
                    MergeStatus::Unmodified
                } else {
                    MergeStatus::Modified
                }
            } else if o == b || t == b {
                // Exactly one side diverged from the base.
                MergeStatus::Modified
            } else {
                MergeStatus::Conflict
            }
        }
    }
}

/// Diff three committed trees, returning every path that needs a merge
/// action. Unmodified paths are omitted.
pub fn diff_merge_trees(
    repo: &Repository,
    ours_tree: ObjectId,
    base_tree: ObjectId,
    theirs_tree: ObjectId,
) -> Result<Vec<MergeDiffEntry>, DiffError> {
    let walker = Walker::new(
        repo,
        vec![
            WalkSource::Tree(ours_tree),
            WalkSource::Tree(base_tree),
            WalkSource::Tree(theirs_tree),
        ],
    )?;
    let odb = repo.odb();

    let mut entries = Vec::new();
    walker.walk(|path, views| {
        for view in views.iter().flatten() {
            if view.mode().is_gitlink() {
                return Err(DiffError::SubmodulesNotSupported(BString::from(path)));
            }
        }

        let ours = side_of(views[0].as_ref(), odb)?;
        let base = side_of(views[1].as_ref(), odb)?;
        let theirs = side_of(views[2].as_ref(), odb)?;

        // Directory-only rows carry no content to merge.
        if ours.is_none() && base.is_none() && theirs.is_none() {
            return Ok(());
        }

        let status = classify(ours.as_ref(), theirs.as_ref(), base.as_ref());
        if status != MergeStatus::Unmodified {
            entries.push(MergeDiffEntry {
                path: BString::from(path),
                status,
                ours,
                theirs,
                base,
            });
        }
        Ok(())
    })?;

    Ok(entries)
}

/// Extract a content-bearing side from a walker view (None for directories).
fn side_of(view: Option<&WalkEntry>, odb: &ObjectStore) -> Result<Option<ChangeSide>, DiffError> {
    match view {
        Some(entry) if !entry.is_tree() => Ok(Some(ChangeSide {
            oid: entry.oid(odb)?,
            mode: entry.mode(),
        })),
        _ => Ok(None),
    }
}
