use std::path::PathBuf;

use mgit_hash::ObjectId;

/// Errors from repository-level operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a git repository: {0}")]
    NotFound(PathBuf),

    #[error("bare repository has no working tree")]
    BareNoWorkTree,

    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("expected {expected} object, got {actual} for {oid}")]
    UnexpectedObjectType {
        oid: ObjectId,
        expected: &'static str,
        actual: String,
    },

    #[error(transparent)]
    Ref(#[from] mgit_ref::RefError),

    #[error(transparent)]
    Odb(#[from] mgit_odb::OdbError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
