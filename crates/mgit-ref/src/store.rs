use std::path::{Path, PathBuf};

use mgit_hash::ObjectId;

use crate::error::RefError;
use crate::loose;
use crate::name::RefName;
use crate::packed::PackedRefs;
use crate::Reference;

/// Maximum depth for following symbolic ref chains.
const MAX_SYMREF_DEPTH: usize = 10;

/// Prefixes searched when expanding a short ref name, in priority order.
const EXPAND_PREFIXES: &[&str] = &["refs/heads/", "refs/remotes/", "refs/tags/"];

/// Files-backed ref store (loose refs + read-only packed-refs).
///
/// Matches C git's files backend behavior:
/// - Loose refs stored as individual files under `.git/refs/`
/// - Packed refs in `.git/packed-refs` consulted as a fallback
/// - Loose refs take precedence over packed refs
/// - Lock files for atomic updates
pub struct RefStore {
    git_dir: PathBuf,
}

impl RefStore {
    /// Create a ref store rooted at a git directory.
    pub fn new(git_dir: impl AsRef<Path>) -> Self {
        Self {
            git_dir: git_dir.as_ref().to_path_buf(),
        }
    }

    /// Get the git directory path.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Read a ref without following symbolic chains.
    pub fn read(&self, name: &RefName) -> Result<Option<Reference>, RefError> {
        match loose::read_loose_ref(&self.git_dir, name)? {
            Some(r) => Ok(Some(r)),
            None => {
                let packed = PackedRefs::load(&self.git_dir)?;
                Ok(packed.find(name).map(|pr| Reference::Direct {
                    name: pr.name.clone(),
                    target: pr.oid,
                }))
            }
        }
    }

    /// Resolve a ref name to an OID, following symbolic ref chains.
    ///
    /// Fails with [`RefError::NotResolved`] if the chain terminates without
    /// reaching a 40-hex value.
    pub fn resolve(&self, name: &RefName) -> Result<ObjectId, RefError> {
        self.resolve_inner(name, 0)?
            .ok_or_else(|| RefError::NotResolved(name.to_string()))
    }

    /// Like [`resolve`](Self::resolve), but returns `Ok(None)` for a ref that
    /// does not exist or dangles (e.g., HEAD on an unborn branch).
    pub fn try_resolve(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        self.resolve_inner(name, 0)
    }

    fn resolve_inner(&self, name: &RefName, depth: usize) -> Result<Option<ObjectId>, RefError> {
        if depth > MAX_SYMREF_DEPTH {
            return Err(RefError::SymrefLoop(name.to_string()));
        }

        match loose::read_loose_ref(&self.git_dir, name)? {
            Some(Reference::Direct { target, .. }) => Ok(Some(target)),
            Some(Reference::Symbolic { target, .. }) => self.resolve_inner(&target, depth + 1),
            None => {
                let packed = PackedRefs::load(&self.git_dir)?;
                Ok(packed.find(name).map(|pr| pr.oid))
            }
        }
    }

    /// Expand a possibly-short ref name to its full form.
    ///
    /// Tries the name as given first (covers full refs and special refs like
    /// `HEAD`), then `refs/heads/`, `refs/remotes/`, `refs/tags/` in priority
    /// order. Fails with [`RefError::NotExpanded`] when nothing matches.
    pub fn expand(&self, short: &str) -> Result<RefName, RefError> {
        let direct = RefName::new(short)?;
        if self.exists(&direct)? {
            return Ok(direct);
        }

        for prefix in EXPAND_PREFIXES {
            let candidate = RefName::new(format!("{prefix}{short}"))?;
            if self.exists(&candidate)? {
                return Ok(candidate);
            }
        }

        Err(RefError::NotExpanded(short.to_string()))
    }

    /// Whether a ref exists (loose or packed), without resolving chains.
    pub fn exists(&self, name: &RefName) -> Result<bool, RefError> {
        if loose::read_loose_ref(&self.git_dir, name)?.is_some() {
            return Ok(true);
        }
        let packed = PackedRefs::load(&self.git_dir)?;
        Ok(packed.find(name).is_some())
    }

    /// Write a direct ref (atomic write-then-rename).
    pub fn write_ref(&self, name: &RefName, oid: &ObjectId) -> Result<(), RefError> {
        loose::write_loose_ref(&self.git_dir, name, oid)
    }

    /// Write a symbolic ref (atomic write-then-rename).
    pub fn write_symbolic_ref(&self, name: &RefName, target: &RefName) -> Result<(), RefError> {
        loose::write_symbolic_ref(&self.git_dir, name, target)
    }

    /// Delete a loose ref.
    pub fn delete_ref(&self, name: &RefName) -> Result<(), RefError> {
        loose::delete_loose_ref(&self.git_dir, name)
    }
}
