//! Repository discovery, initialization, and central access for the mgit
//! subsystems.

mod error;
mod init;

pub use error::RepoError;

use std::path::{Path, PathBuf};

use mgit_hash::ObjectId;
use mgit_object::{Commit, Object, Tag};
use mgit_odb::ObjectStore;
use mgit_ref::{RefName, RefStore, Reference};

/// The central repository struct tying the subsystems together.
pub struct Repository {
    /// Path to the .git directory.
    git_dir: PathBuf,
    /// Path to the working tree (None for bare repos).
    work_tree: Option<PathBuf>,
    /// Object database.
    odb: ObjectStore,
    /// Reference store.
    refs: RefStore,
    /// Path to the index file.
    index_path: PathBuf,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("git_dir", &self.git_dir)
            .field("work_tree", &self.work_tree)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Open an existing repository at the given path.
    ///
    /// `path` should point to either the `.git` directory or the working tree
    /// root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        if path.join(".git").is_dir() {
            Self::from_dirs(path.join(".git"), Some(path.to_path_buf()))
        } else if path.join("HEAD").is_file() && path.join("objects").is_dir() {
            // Bare repository or a .git directory given directly.
            let work_tree = path
                .file_name()
                .filter(|n| n.to_str() == Some(".git"))
                .and_then(|_| path.parent())
                .map(|p| p.to_path_buf());
            Self::from_dirs(path.to_path_buf(), work_tree)
        } else {
            Err(RepoError::NotFound(path.to_path_buf()))
        }
    }

    /// Initialize a new repository with a working tree at the given path.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        init::init_repository(path.as_ref(), init::DEFAULT_BRANCH)?;
        Self::open(path)
    }

    /// Initialize a new repository with a specific initial branch.
    pub fn init_with_branch(path: impl AsRef<Path>, branch: &str) -> Result<Self, RepoError> {
        init::init_repository(path.as_ref(), branch)?;
        Self::open(path)
    }

    fn from_dirs(git_dir: PathBuf, work_tree: Option<PathBuf>) -> Result<Self, RepoError> {
        let odb = ObjectStore::open(git_dir.join("objects"));
        let refs = RefStore::new(&git_dir);
        let index_path = git_dir.join("index");

        Ok(Self {
            git_dir,
            work_tree,
            odb,
            refs,
            index_path,
        })
    }

    // --- Path accessors ---

    /// Path to the .git directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Path to the working tree (None for bare repos).
    pub fn work_tree(&self) -> Option<&Path> {
        self.work_tree.as_deref()
    }

    /// Path to the working tree, failing for bare repositories.
    pub fn require_work_tree(&self) -> Result<&Path, RepoError> {
        self.work_tree.as_deref().ok_or(RepoError::BareNoWorkTree)
    }

    /// Path to the index file.
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    // --- Subsystem accessors ---

    /// Access the object database.
    pub fn odb(&self) -> &ObjectStore {
        &self.odb
    }

    /// Access the reference store.
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    // --- Convenience methods ---

    /// Resolve HEAD to an OID. `None` on an unborn branch.
    pub fn head_oid(&self) -> Result<Option<ObjectId>, RepoError> {
        let head = RefName::new("HEAD")?;
        Ok(self.refs.try_resolve(&head)?)
    }

    /// Get the full ref HEAD points at (None when detached).
    pub fn current_ref(&self) -> Result<Option<RefName>, RepoError> {
        let head = RefName::new("HEAD")?;
        match self.refs.read(&head)? {
            Some(Reference::Symbolic { target, .. }) => Ok(Some(target)),
            _ => Ok(None),
        }
    }

    /// Read a commit, peeling annotated tags along the way.
    pub fn read_commit(&self, oid: &ObjectId) -> Result<Commit, RepoError> {
        let mut current = *oid;
        // Tag chains are short; bound the peel to avoid cycles in corrupt data.
        for _ in 0..10 {
            match self
                .odb
                .read_cached(&current)?
                .ok_or(RepoError::ObjectNotFound(current))?
            {
                Object::Commit(c) => return Ok(c),
                Object::Tag(Tag { object, .. }) => current = object,
                other => {
                    return Err(RepoError::UnexpectedObjectType {
                        oid: current,
                        expected: "commit",
                        actual: other.object_type().to_string(),
                    })
                }
            }
        }
        Err(RepoError::UnexpectedObjectType {
            oid: *oid,
            expected: "commit",
            actual: "tag chain too deep".into(),
        })
    }

    /// Read the tree OID a commit-ish resolves to.
    pub fn commit_tree(&self, oid: &ObjectId) -> Result<ObjectId, RepoError> {
        Ok(self.read_commit(oid)?.tree)
    }
}
