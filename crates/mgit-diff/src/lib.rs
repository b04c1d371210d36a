//! Diff engine for the mgit git client.
//!
//! Three pieces live here:
//!
//! - [`algorithm`]: line-level Myers diff producing edit scripts, consumed by
//!   the three-way content merger.
//! - [`walk`]: a unified walker that traverses any combination of committed
//!   trees, the index, and the working directory in parallel, yielding
//!   per-path tuples of lazily-populated views.
//! - [`three_way`]: classification of each walked path across
//!   (ours, theirs, base) for the merge machinery.

pub mod algorithm;
pub mod three_way;
pub mod walk;

use bstr::BString;
use mgit_hash::ObjectId;

/// Errors from diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("expected {expected} object, got {actual} for {oid}")]
    UnexpectedObjectType {
        oid: ObjectId,
        expected: &'static str,
        actual: String,
    },

    #[error("submodules are not supported (gitlink at {0})")]
    SubmodulesNotSupported(BString),

    #[error(transparent)]
    Odb(#[from] mgit_odb::OdbError),

    #[error(transparent)]
    Index(#[from] mgit_index::IndexError),

    #[error(transparent)]
    Repo(#[from] mgit_repo::RepoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
