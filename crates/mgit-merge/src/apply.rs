//! Application of per-path merge decisions to the working directory and
//! index.
//!
//! The orchestrator collects the full three-way diff first, then applies it
//! entry by entry: working-directory writes happen immediately, while index
//! mutations are collected as [`IndexOp`]s and committed inside a single
//! index critical section. A failure mid-apply can leave the working
//! directory partially updated; the index only moves if the whole batch
//! reaches the critical section.

use std::fs;
use std::path::Path;

use bstr::{BStr, BString, ByteSlice};
use mgit_diff::three_way::{ChangeSide, MergeDiffEntry, MergeStatus};
use mgit_hash::ObjectId;
use mgit_index::{IndexGuard, StatData};
use mgit_object::{FileMode, Object, ObjectType};
use mgit_odb::ObjectStore;
use mgit_repo::Repository;

use crate::content::{merge_content, MergeLabels};
use crate::MergeError;

/// A deferred index mutation.
pub(crate) enum IndexOp {
    Stage {
        path: BString,
        oid: ObjectId,
        mode: FileMode,
        stat: StatData,
    },
    Remove {
        path: BString,
    },
    Conflict {
        path: BString,
        stat: StatData,
        base: Option<(ObjectId, FileMode)>,
        ours: Option<(ObjectId, FileMode)>,
        theirs: Option<(ObjectId, FileMode)>,
    },
}

/// Result of applying one diff entry.
pub(crate) struct ApplyOutcome {
    pub op: Option<IndexOp>,
    /// False when the entry left conflict markers behind.
    pub clean: bool,
}

/// Apply one diff entry to the working directory, deferring the index side.
///
/// `persist_objects` controls whether merged blobs are written to the object
/// store or only hashed (the dry-run path).
pub(crate) fn apply_entry(
    repo: &Repository,
    entry: &MergeDiffEntry,
    labels: &MergeLabels<'_>,
    persist_objects: bool,
) -> Result<ApplyOutcome, MergeError> {
    let odb = repo.odb();
    let work_tree = repo.require_work_tree()?;
    let path = entry.path.as_bstr();

    match entry.status {
        MergeStatus::Unmodified => Ok(ApplyOutcome {
            op: None,
            clean: true,
        }),

        MergeStatus::Added => {
            // Take whichever side has the file (ours wins identical adds).
            let side = entry
                .ours
                .or(entry.theirs)
                .expect("Added status implies a side present");
            let content = read_blob(odb, &side.oid)?;
            let stat = write_workfile(work_tree, path, &content, side.mode)?;
            Ok(ApplyOutcome {
                op: Some(IndexOp::Stage {
                    path: entry.path.clone(),
                    oid: side.oid,
                    mode: side.mode,
                    stat,
                }),
                clean: true,
            })
        }

        MergeStatus::Deleted => {
            remove_workfile(work_tree, path)?;
            Ok(ApplyOutcome {
                op: Some(IndexOp::Remove {
                    path: entry.path.clone(),
                }),
                clean: true,
            })
        }

        MergeStatus::Modified => {
            // Modified only arises with all three sides present.
            let base = entry
                .base
                .expect("Modified status implies a base side");
            let ours = entry
                .ours
                .expect("Modified status implies both sides present");
            let theirs = entry
                .theirs
                .expect("Modified status implies both sides present");

            // Content comes from the side that diverged from the base; the
            // mode from whichever side changed it.
            let pick = if ours.oid != base.oid { ours } else { theirs };
            let mode = merged_mode(Some(base), ours, theirs);

            let content = read_blob(odb, &pick.oid)?;
            let stat = write_workfile(work_tree, path, &content, mode)?;
            Ok(ApplyOutcome {
                op: Some(IndexOp::Stage {
                    path: entry.path.clone(),
                    oid: pick.oid,
                    mode,
                    stat,
                }),
                clean: true,
            })
        }

        MergeStatus::Conflict => {
            // The classifier only yields Conflict when both sides exist
            // (diverging edits or dual adds); a missing side here means the
            // diff engine broke its contract, not a mergeable state.
            let ours = entry
                .ours
                .expect("Conflict status implies both sides present");
            let theirs = entry
                .theirs
                .expect("Conflict status implies both sides present");

            let base_content = match &entry.base {
                Some(base) => read_blob(odb, &base.oid)?,
                None => Vec::new(),
            };
            let ours_content = read_blob(odb, &ours.oid)?;
            let theirs_content = read_blob(odb, &theirs.oid)?;

            let merged = merge_content(&base_content, &ours_content, &theirs_content, labels);
            let mode = merged_mode(entry.base, ours, theirs);
            let stat = write_workfile(work_tree, path, merged.content(), mode)?;

            if merged.is_clean() {
                let content = merged.into_content();
                let oid = if persist_objects {
                    odb.write_raw(ObjectType::Blob, &content)?
                } else {
                    ObjectStore::hash_raw(ObjectType::Blob, &content)?
                };
                Ok(ApplyOutcome {
                    op: Some(IndexOp::Stage {
                        path: entry.path.clone(),
                        oid,
                        mode,
                        stat,
                    }),
                    clean: true,
                })
            } else {
                Ok(ApplyOutcome {
                    op: Some(IndexOp::Conflict {
                        path: entry.path.clone(),
                        stat,
                        base: entry.base.map(|b| (b.oid, b.mode)),
                        ours: entry.ours.map(|o| (o.oid, o.mode)),
                        theirs: entry.theirs.map(|t| (t.oid, t.mode)),
                    }),
                    clean: false,
                })
            }
        }
    }
}

/// Apply collected index operations inside a critical section.
pub(crate) fn apply_index_ops(guard: &mut IndexGuard<'_>, ops: &[IndexOp]) {
    for op in ops {
        match op {
            IndexOp::Stage {
                path,
                oid,
                mode,
                stat,
            } => guard.insert(path.as_bstr(), *oid, *mode, *stat),
            IndexOp::Remove { path } => guard.remove(path.as_bstr()),
            IndexOp::Conflict {
                path,
                stat,
                base,
                ours,
                theirs,
            } => guard.write_conflict(path.as_bstr(), *stat, *base, *ours, *theirs),
        }
    }
}

/// Mode of a merged entry: the side that changed the base mode wins.
fn merged_mode(base: Option<ChangeSide>, ours: ChangeSide, theirs: ChangeSide) -> FileMode {
    match base {
        Some(base) if base.mode == ours.mode => theirs.mode,
        _ => ours.mode,
    }
}

/// Read a blob's bytes from the object store.
pub(crate) fn read_blob(odb: &ObjectStore, oid: &ObjectId) -> Result<Vec<u8>, MergeError> {
    match odb.read_cached(oid)? {
        Some(Object::Blob(blob)) => Ok(blob.data),
        Some(other) => Err(MergeError::ObjectTypeAssertion {
            oid: *oid,
            expected: "blob",
            actual: other.object_type().to_string(),
        }),
        None => Err(MergeError::ObjectNotFound(*oid)),
    }
}

/// Write file content under the working tree and return fresh stat data.
///
/// Executable blobs are forced to mode 0o755 on disk so stat comparisons
/// stay stable on filesystems with unreliable permission bits; symlink
/// entries are materialized as links with the content as their target.
pub(crate) fn write_workfile(
    work_tree: &Path,
    path: &BStr,
    content: &[u8],
    mode: FileMode,
) -> Result<StatData, MergeError> {
    let abs = work_tree.join(path.to_str_lossy().as_ref());
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)?;
    }

    // A directory may occupy the path when the entry changed type.
    if let Ok(meta) = fs::symlink_metadata(&abs) {
        if meta.is_dir() {
            fs::remove_dir_all(&abs)?;
        }
    }

    if mode.is_symlink() {
        match fs::remove_file(&abs) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(MergeError::Io(e)),
        }
        #[cfg(unix)]
        {
            use std::ffi::OsStr;
            use std::os::unix::ffi::OsStrExt;
            std::os::unix::fs::symlink(OsStr::from_bytes(content), &abs)?;
        }
        #[cfg(not(unix))]
        {
            fs::write(&abs, content)?;
        }
    } else {
        fs::write(&abs, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let bits = if mode == FileMode::Executable { 0o755 } else { 0o644 };
            fs::set_permissions(&abs, fs::Permissions::from_mode(bits))?;
        }
    }

    let meta = fs::symlink_metadata(&abs)?;
    Ok(StatData::from_metadata(&meta))
}

/// Remove a file from the working tree (already-gone is fine).
pub(crate) fn remove_workfile(work_tree: &Path, path: &BStr) -> Result<(), MergeError> {
    let abs = work_tree.join(path.to_str_lossy().as_ref());
    match fs::remove_file(&abs) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MergeError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_mode_follows_the_changing_side() {
        let base = ChangeSide {
            oid: ObjectId::from([1; 20]),
            mode: FileMode::Regular,
        };
        let exec = ChangeSide {
            oid: ObjectId::from([1; 20]),
            mode: FileMode::Executable,
        };

        // Theirs flipped the executable bit.
        assert_eq!(merged_mode(Some(base), base, exec), FileMode::Executable);
        // Ours flipped it.
        assert_eq!(merged_mode(Some(base), exec, base), FileMode::Executable);
        // Nobody changed it.
        assert_eq!(merged_mode(Some(base), base, base), FileMode::Regular);
        // No base: ours wins.
        assert_eq!(merged_mode(None, exec, base), FileMode::Executable);
    }

    #[test]
    fn workfile_roundtrip_with_exec_bit() {
        let dir = tempfile::tempdir().unwrap();

        let stat = write_workfile(
            dir.path(),
            b"bin/tool".as_bstr(),
            b"#!/bin/sh\n",
            FileMode::Executable,
        )
        .unwrap();
        assert!(stat.size > 0);

        let abs = dir.path().join("bin/tool");
        assert_eq!(fs::read(&abs).unwrap(), b"#!/bin/sh\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&abs).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlink_materialized_from_content() {
        let dir = tempfile::tempdir().unwrap();

        write_workfile(
            dir.path(),
            b"link".as_bstr(),
            b"target.txt",
            FileMode::Symlink,
        )
        .unwrap();

        let target = fs::read_link(dir.path().join("link")).unwrap();
        assert_eq!(target.to_str().unwrap(), "target.txt");
    }

    #[test]
    fn remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_workfile(dir.path(), b"not-there.txt".as_bstr()).unwrap();
    }
}
