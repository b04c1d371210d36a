//! Unified multi-source tree walker.
//!
//! Walks any tuple of "sources" in parallel — committed trees, the index
//! (stage 0), or the working directory — yielding, for every path present in
//! at least one source, a tuple of per-source views. Traversal is depth
//! first over the name-sorted union of children at each directory level, so
//! iteration order over any given tuple of sources is deterministic.
//!
//! Views are lazy: a view records where its data lives and loads its OID or
//! content on first request, memoizing the result. For working-directory
//! views the OID is the index OID when the cached stat data still matches
//! the file, and a fresh content hash otherwise.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use bstr::{BStr, BString, ByteSlice};
use mgit_hash::ObjectId;
use mgit_index::{Index, Stage, StatData};
use mgit_object::{FileMode, Object};
use mgit_odb::ObjectStore;
use mgit_repo::Repository;

use crate::DiffError;

/// One source for the walker.
#[derive(Debug, Clone, Copy)]
pub enum WalkSource {
    /// A committed tree, identified by its root tree OID.
    Tree(ObjectId),
    /// The index (stage-0 entries).
    Index,
    /// The working directory.
    Workdir,
}

/// A per-source view of one walked path.
pub struct WalkEntry {
    path: BString,
    mode: FileMode,
    origin: Origin,
    oid_cache: RefCell<Option<ObjectId>>,
    content_cache: RefCell<Option<Vec<u8>>>,
}

enum Origin {
    /// Entry of a committed tree (blob or subtree).
    Tree { oid: ObjectId },
    /// Stage-0 index entry.
    IndexFile { oid: ObjectId },
    /// Directory synthesized from index paths (the index is flat).
    IndexDir,
    /// Working-directory entry, with the matching index entry (if any) for
    /// the stat-based OID shortcut.
    Workdir {
        abs: PathBuf,
        meta: fs::Metadata,
        hint: Option<(ObjectId, StatData, FileMode)>,
    },
}

impl WalkEntry {
    /// Full path of this entry, `/`-separated, relative to the repo root.
    pub fn path(&self) -> &BStr {
        self.path.as_bstr()
    }

    /// The entry's mode.
    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Is this a directory view?
    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }

    /// The entry's object id, computed on first call and memoized.
    ///
    /// For working-directory entries: when an index entry exists for the path
    /// and its stat data still matches the file, the index OID is reused;
    /// otherwise the content is read and hashed.
    pub fn oid(&self, odb: &ObjectStore) -> Result<ObjectId, DiffError> {
        if let Some(oid) = *self.oid_cache.borrow() {
            return Ok(oid);
        }

        let oid = match &self.origin {
            Origin::Tree { oid } | Origin::IndexFile { oid } => *oid,
            Origin::IndexDir => {
                return Err(DiffError::UnexpectedObjectType {
                    oid: ObjectId::NULL,
                    expected: "blob",
                    actual: "index directory".into(),
                })
            }
            Origin::Workdir { meta, hint, .. } => {
                if let Some((oid, stat, mode)) = hint {
                    if *mode == self.mode && stat.matches(meta) {
                        *self.oid_cache.borrow_mut() = Some(*oid);
                        return Ok(*oid);
                    }
                }
                let content = self.content(odb)?;
                ObjectStore::hash_raw(mgit_object::ObjectType::Blob, &content)?
            }
        };

        *self.oid_cache.borrow_mut() = Some(oid);
        Ok(oid)
    }

    /// The entry's content, loaded on first call and memoized.
    ///
    /// For symlinks this is the link target; for blobs the file bytes.
    pub fn content(&self, odb: &ObjectStore) -> Result<Vec<u8>, DiffError> {
        if let Some(content) = self.content_cache.borrow().as_ref() {
            return Ok(content.clone());
        }

        let content = match &self.origin {
            Origin::Tree { oid } | Origin::IndexFile { oid } => read_blob(odb, oid)?,
            Origin::IndexDir => {
                return Err(DiffError::UnexpectedObjectType {
                    oid: ObjectId::NULL,
                    expected: "blob",
                    actual: "index directory".into(),
                })
            }
            Origin::Workdir { abs, .. } => {
                if self.mode.is_symlink() {
                    link_target_bytes(abs)?
                } else {
                    fs::read(abs)?
                }
            }
        };

        *self.content_cache.borrow_mut() = Some(content.clone());
        Ok(content)
    }

    fn dir_handle(&self) -> DirHandle {
        match &self.origin {
            Origin::Tree { oid } => DirHandle::Tree(*oid),
            Origin::IndexDir | Origin::IndexFile { .. } => DirHandle::Index,
            Origin::Workdir { abs, .. } => DirHandle::Workdir(abs.clone()),
        }
    }
}

/// Read a blob's bytes from the object store.
fn read_blob(odb: &ObjectStore, oid: &ObjectId) -> Result<Vec<u8>, DiffError> {
    match odb.read_cached(oid)? {
        Some(Object::Blob(blob)) => Ok(blob.data),
        Some(other) => Err(DiffError::UnexpectedObjectType {
            oid: *oid,
            expected: "blob",
            actual: other.object_type().to_string(),
        }),
        None => Err(DiffError::ObjectNotFound(*oid)),
    }
}

/// Read a symlink target as raw bytes.
fn link_target_bytes(path: &std::path::Path) -> Result<Vec<u8>, DiffError> {
    let target = fs::read_link(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Ok(target.as_os_str().as_bytes().to_vec())
    }
    #[cfg(not(unix))]
    {
        Ok(target.to_string_lossy().into_owned().into_bytes())
    }
}

/// Where a source's children at one directory level come from.
#[derive(Debug, Clone)]
enum DirHandle {
    Tree(ObjectId),
    Index,
    Workdir(PathBuf),
    Absent,
}

/// A named child of one source at one directory level.
struct Child {
    name: BString,
    node: ChildNode,
}

enum ChildNode {
    Tree { mode: FileMode, oid: ObjectId },
    IndexFile { mode: FileMode, oid: ObjectId },
    IndexDir,
    Workdir { abs: PathBuf, mode: FileMode, meta: fs::Metadata },
}

/// The unified walker over a tuple of sources.
pub struct Walker<'r> {
    repo: &'r Repository,
    sources: Vec<WalkSource>,
    /// Snapshot of the index, used by Index and Workdir sources.
    index: Index,
}

impl<'r> Walker<'r> {
    /// Create a walker over the given sources.
    pub fn new(repo: &'r Repository, sources: Vec<WalkSource>) -> Result<Self, DiffError> {
        let needs_index = sources
            .iter()
            .any(|s| matches!(s, WalkSource::Index | WalkSource::Workdir));
        let index = if needs_index {
            Index::read_from(repo.index_path())?
        } else {
            Index::new()
        };
        Ok(Self {
            repo,
            sources,
            index,
        })
    }

    /// Walk all sources, invoking `visit` for every path present in at least
    /// one of them. The views slice is in source order; absent sources yield
    /// `None`. Errors from `visit` abort the walk and propagate.
    pub fn walk<F>(&self, mut visit: F) -> Result<(), DiffError>
    where
        F: FnMut(&BStr, &[Option<WalkEntry>]) -> Result<(), DiffError>,
    {
        let mut handles = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            handles.push(match source {
                WalkSource::Tree(oid) => DirHandle::Tree(*oid),
                WalkSource::Index => DirHandle::Index,
                WalkSource::Workdir => {
                    DirHandle::Workdir(self.repo.require_work_tree()?.to_path_buf())
                }
            });
        }
        self.walk_dir(BStr::new(""), &handles, &mut visit)
    }

    fn walk_dir<F>(
        &self,
        prefix: &BStr,
        handles: &[DirHandle],
        visit: &mut F,
    ) -> Result<(), DiffError>
    where
        F: FnMut(&BStr, &[Option<WalkEntry>]) -> Result<(), DiffError>,
    {
        let mut lists = Vec::with_capacity(handles.len());
        for handle in handles {
            lists.push(self.children_of(prefix, handle)?);
        }

        let mut cursors = vec![0usize; lists.len()];

        loop {
            // Smallest name among the source heads is the next union member.
            let mut min: Option<BString> = None;
            for (list, &cur) in lists.iter().zip(&cursors) {
                if let Some(child) = list.get(cur) {
                    if min.as_ref().map_or(true, |m| child.name < *m) {
                        min = Some(child.name.clone());
                    }
                }
            }
            let Some(name) = min else { break };

            let mut full_path = BString::from(prefix);
            if !full_path.is_empty() {
                full_path.push(b'/');
            }
            full_path.extend_from_slice(&name);

            let mut views: Vec<Option<WalkEntry>> = Vec::with_capacity(lists.len());
            for (list, cur) in lists.iter().zip(cursors.iter_mut()) {
                match list.get(*cur) {
                    Some(child) if child.name == name => {
                        views.push(Some(self.make_entry(&full_path, child)));
                        *cur += 1;
                    }
                    _ => views.push(None),
                }
            }

            visit(full_path.as_bstr(), &views)?;

            // Depth-first: descend wherever some source has a directory.
            if views.iter().flatten().any(|e| e.is_tree()) {
                let child_handles: Vec<DirHandle> = views
                    .iter()
                    .map(|v| match v {
                        Some(e) if e.is_tree() => e.dir_handle(),
                        _ => DirHandle::Absent,
                    })
                    .collect();
                self.walk_dir(full_path.as_bstr(), &child_handles, visit)?;
            }
        }

        Ok(())
    }

    /// List one source's children at a directory level, sorted by name.
    fn children_of(&self, prefix: &BStr, handle: &DirHandle) -> Result<Vec<Child>, DiffError> {
        match handle {
            DirHandle::Absent => Ok(Vec::new()),
            DirHandle::Tree(oid) => self.tree_children(oid),
            DirHandle::Index => Ok(self.index_children(prefix)),
            DirHandle::Workdir(dir) => self.workdir_children(prefix, dir),
        }
    }

    fn tree_children(&self, oid: &ObjectId) -> Result<Vec<Child>, DiffError> {
        let tree = match self.repo.odb().read_cached(oid)? {
            Some(Object::Tree(t)) => t,
            Some(other) => {
                return Err(DiffError::UnexpectedObjectType {
                    oid: *oid,
                    expected: "tree",
                    actual: other.object_type().to_string(),
                })
            }
            None => return Err(DiffError::ObjectNotFound(*oid)),
        };

        let mut children: Vec<Child> = tree
            .entries
            .into_iter()
            .map(|e| Child {
                name: e.name,
                node: ChildNode::Tree {
                    mode: e.mode,
                    oid: e.oid,
                },
            })
            .collect();
        // Tree objects are stored in git canonical order (directories compare
        // with a trailing '/'); the union merge keys on plain byte order.
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    fn index_children(&self, prefix: &BStr) -> Vec<Child> {
        let mut map: BTreeMap<BString, ChildNode> = BTreeMap::new();

        for entry in self.index.iter().filter(|e| e.stage == Stage::Normal) {
            let rest: &[u8] = if prefix.is_empty() {
                &entry.path[..]
            } else if entry.path.len() > prefix.len()
                && entry.path.starts_with(prefix.as_bytes())
                && entry.path[prefix.len()] == b'/'
            {
                &entry.path[prefix.len() + 1..]
            } else {
                continue;
            };

            match rest.find_byte(b'/') {
                Some(slash) => {
                    map.entry(BString::from(&rest[..slash]))
                        .or_insert(ChildNode::IndexDir);
                }
                None => {
                    map.insert(
                        BString::from(rest),
                        ChildNode::IndexFile {
                            mode: entry.mode,
                            oid: entry.oid,
                        },
                    );
                }
            }
        }

        map.into_iter()
            .map(|(name, node)| Child { name, node })
            .collect()
    }

    fn workdir_children(
        &self,
        prefix: &BStr,
        dir: &std::path::Path,
    ) -> Result<Vec<Child>, DiffError> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DiffError::Io(e)),
        };

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = BString::from(entry.file_name().to_string_lossy().as_bytes());

            // The git directory is never part of the working-tree walk.
            if prefix.is_empty() && name == ".git" {
                continue;
            }

            let abs = entry.path();
            let meta = fs::symlink_metadata(&abs)?;
            let mode = file_mode_from_metadata(&meta);

            children.push(Child {
                name,
                node: ChildNode::Workdir { abs, mode, meta },
            });
        }

        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    fn make_entry(&self, full_path: &BString, child: &Child) -> WalkEntry {
        let (mode, origin) = match &child.node {
            ChildNode::Tree { mode, oid } => (*mode, Origin::Tree { oid: *oid }),
            ChildNode::IndexFile { mode, oid } => (*mode, Origin::IndexFile { oid: *oid }),
            ChildNode::IndexDir => (FileMode::Tree, Origin::IndexDir),
            ChildNode::Workdir { abs, mode, meta } => {
                let hint = self
                    .index
                    .get(full_path.as_bstr(), Stage::Normal)
                    .map(|e| (e.oid, e.stat, e.mode));
                (
                    *mode,
                    Origin::Workdir {
                        abs: abs.clone(),
                        meta: meta.clone(),
                        hint,
                    },
                )
            }
        };

        WalkEntry {
            path: full_path.clone(),
            mode,
            origin,
            oid_cache: RefCell::new(None),
            content_cache: RefCell::new(None),
        }
    }
}

/// Determine a FileMode from filesystem metadata.
pub fn file_mode_from_metadata(meta: &fs::Metadata) -> FileMode {
    if meta.is_symlink() {
        FileMode::Symlink
    } else if meta.is_dir() {
        FileMode::Tree
    } else {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if meta.permissions().mode() & 0o111 != 0 {
                return FileMode::Executable;
            }
        }
        FileMode::Regular
    }
}
