//! Commit-graph traversal for the mgit git client.
//!
//! The one walk the merge core needs: finding lowest common ancestors of a
//! set of commits over the parent DAG.

mod merge_base;

pub use merge_base::{is_ancestor, merge_base, MAX_MERGE_SOURCES};

/// Errors from revision-walking operations.
#[derive(Debug, thiserror::Error)]
pub enum RevWalkError {
    #[error("too many merge sources: {0} (max 32)")]
    TooManySources(usize),

    #[error(transparent)]
    Repo(#[from] mgit_repo::RepoError),
}
