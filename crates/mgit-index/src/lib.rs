//! Index (staging area) for the mgit git client.
//!
//! Provides reading, writing, and manipulation of the git index file
//! (`.git/index`). The index sits between the working tree and the object
//! database, tracking which files are staged for the next commit; during a
//! merge it additionally records unresolved conflicts as stage 1/2/3 entries.
//!
//! All access from higher layers goes through [`manager::acquire`], which
//! serializes access per index path and keeps a stat-validated in-memory
//! cache of the parsed file.

pub mod entry;
pub mod manager;
mod read;
mod write;

use std::path::Path;

use bstr::{BStr, BString};
use mgit_hash::ObjectId;
use mgit_odb::ObjectStore;

pub use entry::{EntryFlags, IndexEntry, StatData};
pub use manager::{acquire, IndexGuard};

/// Errors from index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid index header: {0}")]
    InvalidHeader(String),

    #[error("unsupported index version: {0}")]
    UnsupportedVersion(u32),

    #[error("index checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid index entry at offset {offset}: {reason}")]
    InvalidEntry { offset: usize, reason: String },

    #[error("invalid extension '{sig}': {reason}")]
    InvalidExtension { sig: String, reason: String },

    #[error("lock failed: {path}")]
    LockFailed { path: std::path::PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Odb(#[from] mgit_odb::OdbError),
}

/// Merge stage for index entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Normal entry (stage 0).
    Normal,
    /// Base version in merge conflict (stage 1).
    Base,
    /// Ours version in merge conflict (stage 2).
    Ours,
    /// Theirs version in merge conflict (stage 3).
    Theirs,
}

impl Stage {
    pub fn as_u8(&self) -> u8 {
        match self {
            Stage::Normal => 0,
            Stage::Base => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    pub fn from_u8(n: u8) -> Result<Self, IndexError> {
        match n {
            0 => Ok(Stage::Normal),
            1 => Ok(Stage::Base),
            2 => Ok(Stage::Ours),
            3 => Ok(Stage::Theirs),
            _ => Err(IndexError::InvalidEntry {
                offset: 0,
                reason: format!("invalid stage: {n}"),
            }),
        }
    }
}

/// A raw index extension preserved for round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExtension {
    pub signature: [u8; 4],
    pub data: Vec<u8>,
}

/// The git index (staging area).
pub struct Index {
    /// Cache entries sorted by (path, stage).
    entries: Vec<IndexEntry>,
    /// Extensions we do not interpret, preserved for round-trip.
    extensions: Vec<RawExtension>,
}

impl Index {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Read the index from a file (memory-mapped). A missing file yields an
    /// empty index.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let file = match std::fs::File::open(path.as_ref()) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(IndexError::Io(e)),
        };
        let data = unsafe { memmap2::Mmap::map(&file) }?;
        read::parse_index(&data)
    }

    /// Write the index to a file (atomic, using a lock file).
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        write::write_index(self, path.as_ref())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the index empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by path and stage.
    pub fn get(&self, path: &BStr, stage: Stage) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|e| e.path[..] == path[..] && e.stage == stage)
    }

    /// Add or update an entry. Maintains sorted order.
    ///
    /// Any preserved extensions (e.g. git's TREE cache) are dropped: they
    /// describe the previous entry set and would mislead other readers.
    pub fn add(&mut self, entry: IndexEntry) {
        self.extensions.clear();
        self.entries
            .retain(|e| !(e.path == entry.path && e.stage == entry.stage));

        let pos = self
            .entries
            .binary_search_by(|e| cmp_entries(e, &entry))
            .unwrap_or_else(|pos| pos);
        self.entries.insert(pos, entry);
    }

    /// Remove entries matching a path and stage. Returns true if any were removed.
    pub fn remove(&mut self, path: &BStr, stage: Stage) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.path[..] == path[..] && e.stage == stage));
        let removed = self.entries.len() < before;
        if removed {
            self.extensions.clear();
        }
        removed
    }

    /// Remove every stage of a path. Returns true if any were removed.
    pub fn remove_all_stages(&mut self, path: &BStr) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.path[..] != path[..]);
        let removed = self.entries.len() < before;
        if removed {
            self.extensions.clear();
        }
        removed
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.extensions.clear();
    }

    /// Check if the path has conflicts (stages 1, 2, or 3).
    pub fn has_conflicts(&self, path: &BStr) -> bool {
        self.entries
            .iter()
            .any(|e| e.path[..] == path[..] && e.stage != Stage::Normal)
    }

    /// Get all paths with any non-zero-stage entry, deduplicated.
    pub fn conflicted_paths(&self) -> Vec<BString> {
        let mut paths: Vec<BString> = self
            .entries
            .iter()
            .filter(|e| e.stage != Stage::Normal)
            .map(|e| e.path.clone())
            .collect();
        paths.dedup();
        paths
    }

    /// Iterate over all entries in (path, stage) order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Extensions preserved from the on-disk file.
    pub fn extensions(&self) -> &[RawExtension] {
        &self.extensions
    }

    pub(crate) fn set_extensions(&mut self, extensions: Vec<RawExtension>) {
        self.extensions = extensions;
    }

    /// Build tree objects from the stage-0 entries, returning the root OID.
    ///
    /// With `persist = false` every tree OID is computed without writing any
    /// object (a dry run); the returned OID is identical either way.
    pub fn write_tree(&self, odb: &ObjectStore, persist: bool) -> Result<ObjectId, IndexError> {
        write::write_tree_from_index(self, odb, persist)
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare two index entries for sort order: by path, then by stage.
fn cmp_entries(a: &IndexEntry, b: &IndexEntry) -> std::cmp::Ordering {
    a.path
        .cmp(&b.path)
        .then(a.stage.as_u8().cmp(&b.stage.as_u8()))
}
