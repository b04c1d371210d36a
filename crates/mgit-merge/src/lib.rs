//! Merge engine for the mgit git client.
//!
//! The top-level workflow lives in [`merge`]: resolve the two refs, find
//! their merge base, dispatch between already-merged, fast-forward, and
//! three-way merge, drive the three-way tree diff, apply per-path actions to
//! the working directory and index, build the result tree, and create the
//! merge commit (or record the conflicted state for the user to resolve).
//!
//! Supporting pieces: [`content`] (three-way line merge with conflict
//! markers), [`checkout`] (tree materialization), and [`commit`] (commit
//! creation with `MERGE_HEAD` handling).

mod apply;
mod checkout;
mod commit_op;
pub mod content;
mod merge;
mod state;

pub use checkout::checkout;
pub use commit_op::{commit, CommitOptions};
pub use merge::{merge, MergeOptions, MergeReport};

use bstr::BString;
use mgit_hash::ObjectId;

/// Errors from merge operations.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("merging {ours} and {theirs}: no common ancestry")]
    NoCommonAncestry { ours: String, theirs: String },

    #[error("a merge commit would be required; cannot fast-forward")]
    FastForwardImpossible,

    #[error("author information is required to create a commit")]
    MissingAuthor,

    #[error("committer information is required to create a commit")]
    MissingCommitter,

    #[error("cannot commit: unmerged paths remain ({})", format_paths(.paths))]
    UnmergedConflicts { paths: Vec<BString> },

    #[error("commit {0} is not present locally")]
    CommitNotFetched(ObjectId),

    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("object {oid} should be a {expected}, found {actual}")]
    ObjectTypeAssertion {
        oid: ObjectId,
        expected: &'static str,
        actual: String,
    },

    #[error(transparent)]
    Ref(#[from] mgit_ref::RefError),

    #[error(transparent)]
    Repo(#[from] mgit_repo::RepoError),

    #[error(transparent)]
    Odb(#[from] mgit_odb::OdbError),

    #[error(transparent)]
    Index(#[from] mgit_index::IndexError),

    #[error(transparent)]
    Diff(#[from] mgit_diff::DiffError),

    #[error(transparent)]
    RevWalk(#[from] mgit_revwalk::RevWalkError),

    #[error(transparent)]
    Hash(#[from] mgit_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_paths(paths: &[BString]) -> String {
    paths
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
