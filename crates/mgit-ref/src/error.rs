use std::path::PathBuf;

/// Errors from reference operations.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    /// A ref (or a link in a symbolic chain) could not be resolved to an OID.
    #[error("could not resolve reference '{0}'")]
    NotResolved(String),

    /// A short ref name matched none of the well-known prefixes.
    #[error("could not expand reference '{0}'")]
    NotExpanded(String),

    #[error("symbolic ref chain too deep at '{0}'")]
    SymrefLoop(String),

    #[error("invalid ref name: {0}")]
    InvalidName(String),

    #[error("cannot lock ref '{name}': {conflict} exists")]
    DirectoryConflict { name: String, conflict: String },

    #[error("ref parse error: {0}")]
    Parse(String),

    #[error("I/O error on {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] mgit_hash::HashError),

    #[error(transparent)]
    Util(#[from] mgit_utils::UtilError),
}
