//! Commit creation.
//!
//! Builds a commit from the index (or an explicit tree), appending the
//! `MERGE_HEAD` commit as a second parent when a merge is in progress, and
//! clearing the merge state files once the commit object is persisted.

use bstr::BString;
use mgit_hash::ObjectId;
use mgit_index::acquire;
use mgit_object::{Commit, ObjectType};
use mgit_odb::ObjectStore;
use mgit_ref::RefName;
use mgit_repo::Repository;
use mgit_utils::date::Signature;

use crate::state;
use crate::MergeError;

/// Options for commit creation.
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Commit message; falls back to `MERGE_MSG` when absent.
    pub message: Option<String>,
    /// Author identity. Required.
    pub author: Option<Signature>,
    /// Committer identity. Required.
    pub committer: Option<Signature>,
    /// Root tree; defaults to the tree built from the index.
    pub tree: Option<ObjectId>,
    /// Parent commits; defaults to HEAD (if born).
    pub parents: Option<Vec<ObjectId>>,
    /// Compute the commit OID without persisting the object or moving refs.
    pub dry_run: bool,
    /// Persist the commit object but leave the branch where it is.
    pub no_update_branch: bool,
    /// Branch to advance; defaults to the ref HEAD points at.
    pub ref_name: Option<RefName>,
}

/// Create a commit and return its OID.
///
/// Refuses to commit while the index holds unmerged conflict entries. When
/// `MERGE_HEAD` exists it is appended as a second parent, and a successful
/// (non-dry-run) commit clears `MERGE_HEAD`/`MERGE_MSG` and so concludes the
/// in-progress merge.
pub fn commit(repo: &Repository, opts: &CommitOptions) -> Result<ObjectId, MergeError> {
    let author = opts.author.clone().ok_or(MergeError::MissingAuthor)?;
    let committer = opts.committer.clone().ok_or(MergeError::MissingCommitter)?;

    // Unmerged entries veto the commit; a clean index yields the tree.
    let persist = !opts.dry_run;
    let odb = repo.odb();
    let tree = match opts.tree {
        Some(tree) => tree,
        None => {
            let (tree, conflicted) = acquire(repo.index_path(), |idx| {
                let conflicted = idx.conflicted_paths();
                if !conflicted.is_empty() {
                    return Ok((ObjectId::NULL, conflicted));
                }
                Ok((idx.write_tree(odb, persist)?, conflicted))
            })?;
            if !conflicted.is_empty() {
                return Err(MergeError::UnmergedConflicts { paths: conflicted });
            }
            tree
        }
    };

    let mut parents = match &opts.parents {
        Some(parents) => parents.clone(),
        None => repo.head_oid()?.into_iter().collect(),
    };

    // An in-progress merge contributes its other side as the second parent.
    let merge_head = state::read_merge_head(repo.git_dir())?;
    if let Some(mh) = merge_head {
        if !parents.contains(&mh) {
            parents.push(mh);
        }
    }

    let message = match &opts.message {
        Some(m) => m.clone(),
        None => state::read_merge_msg(repo.git_dir())?.unwrap_or_default(),
    };
    let mut message = BString::from(message);
    if !message.is_empty() && !message.ends_with(b"\n") {
        message.push(b'\n');
    }

    let commit = Commit {
        tree,
        parents,
        author,
        committer,
        gpgsig: None,
        extra_headers: Vec::new(),
        message,
    };
    let content = commit.serialize_content();

    let oid = if opts.dry_run {
        ObjectStore::hash_raw(ObjectType::Commit, &content)?
    } else {
        odb.write_raw(ObjectType::Commit, &content)?
    };

    if !opts.dry_run {
        if !opts.no_update_branch {
            let target = match &opts.ref_name {
                Some(name) => Some(name.clone()),
                None => repo.current_ref()?,
            };
            match target {
                Some(branch) => repo.refs().write_ref(&branch, &oid)?,
                // Detached HEAD: the commit lands on HEAD itself.
                None => repo.refs().write_ref(&RefName::new("HEAD")?, &oid)?,
            }
        }
        state::clear_merge_state(repo.git_dir())?;
    }

    Ok(oid)
}
