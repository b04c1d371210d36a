//! Transient merge state files: `MERGE_HEAD` and `MERGE_MSG`.
//!
//! `MERGE_HEAD` records the commit being merged; commit creation reads it to
//! append the second parent. `MERGE_MSG` carries the prepared commit message
//! through a conflicted merge. Both are removed once the merge commit lands;
//! after a conflicted merge they stay behind so the repository remains in
//! merging state until the user resolves or aborts.

use std::fs;
use std::path::Path;

use mgit_hash::ObjectId;

use crate::MergeError;

/// Write `MERGE_HEAD` with the commit being merged in.
pub(crate) fn write_merge_head(git_dir: &Path, oid: &ObjectId) -> Result<(), MergeError> {
    fs::write(git_dir.join("MERGE_HEAD"), format!("{}\n", oid.to_hex()))?;
    Ok(())
}

/// Read `MERGE_HEAD` if a merge is in progress.
pub(crate) fn read_merge_head(git_dir: &Path) -> Result<Option<ObjectId>, MergeError> {
    let data = match fs::read_to_string(git_dir.join("MERGE_HEAD")) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MergeError::Io(e)),
    };
    Ok(Some(ObjectId::from_hex(data.trim())?))
}

/// Write the prepared commit message to `MERGE_MSG`.
pub(crate) fn write_merge_msg(git_dir: &Path, message: &str) -> Result<(), MergeError> {
    fs::write(git_dir.join("MERGE_MSG"), message)?;
    Ok(())
}

/// Read `MERGE_MSG` if present.
pub(crate) fn read_merge_msg(git_dir: &Path) -> Result<Option<String>, MergeError> {
    match fs::read_to_string(git_dir.join("MERGE_MSG")) {
        Ok(d) => Ok(Some(d)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(MergeError::Io(e)),
    }
}

/// Remove both state files; called after the merge commit succeeds.
pub(crate) fn clear_merge_state(git_dir: &Path) -> Result<(), MergeError> {
    for name in ["MERGE_HEAD", "MERGE_MSG"] {
        match fs::remove_file(git_dir.join(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(MergeError::Io(e)),
        }
    }
    Ok(())
}
