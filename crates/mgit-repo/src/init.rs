//! Repository initialization: lay down the .git skeleton.

use std::fs;
use std::path::Path;

use crate::RepoError;

pub(crate) const DEFAULT_BRANCH: &str = "master";

/// Create the .git directory structure for a new non-bare repository.
///
/// Idempotent on an already-initialized path: existing HEAD is left alone.
pub(crate) fn init_repository(work_tree: &Path, branch: &str) -> Result<(), RepoError> {
    let git_dir = work_tree.join(".git");

    fs::create_dir_all(git_dir.join("objects"))?;
    fs::create_dir_all(git_dir.join("refs/heads"))?;
    fs::create_dir_all(git_dir.join("refs/tags"))?;

    let head = git_dir.join("HEAD");
    if !head.exists() {
        fs::write(&head, format!("ref: refs/heads/{}\n", branch))?;
    }

    Ok(())
}
