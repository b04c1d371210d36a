//! Exclusive, cached access to the index file.
//!
//! Every read or mutation of the index happens inside [`acquire`], which
//! provides the critical-section protocol:
//!
//! 1. Take a process-wide, path-keyed mutex.
//! 2. Stat the index file; if the stats differ from the cached stats
//!    (`ctime/mtime/dev/ino/size`), reload and replace the cache.
//! 3. Invoke the closure with a guard over the in-memory index.
//! 4. If the closure dirtied the index, serialize, persist, and re-stat.
//! 5. Release the mutex.
//!
//! Waiters queue unbounded on the mutex. `acquire` is NOT reentrant on the
//! same index path within one thread; nesting deadlocks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use bstr::{BStr, BString};
use mgit_hash::ObjectId;
use mgit_object::FileMode;
use mgit_odb::ObjectStore;

use crate::entry::{EntryFlags, IndexEntry, StatData};
use crate::{Index, IndexError, Stage};

/// Identity stats of the index file itself, for stale-cache detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndexFileStat {
    ctime_secs: u64,
    mtime_secs: u64,
    mtime_nsecs: u32,
    dev: u64,
    ino: u64,
    size: u64,
}

#[cfg(unix)]
fn stat_index_file(path: &Path) -> Result<Option<IndexFileStat>, IndexError> {
    use std::os::unix::fs::MetadataExt;
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(IndexFileStat {
            ctime_secs: meta.ctime() as u64,
            mtime_secs: meta.mtime() as u64,
            mtime_nsecs: meta.mtime_nsec() as u32,
            dev: meta.dev(),
            ino: meta.ino(),
            size: meta.len(),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(IndexError::Io(e)),
    }
}

#[cfg(not(unix))]
fn stat_index_file(path: &Path) -> Result<Option<IndexFileStat>, IndexError> {
    use std::time::UNIX_EPOCH;
    match std::fs::metadata(path) {
        Ok(meta) => {
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .unwrap_or_default();
            Ok(Some(IndexFileStat {
                ctime_secs: 0,
                mtime_secs: mtime.as_secs(),
                mtime_nsecs: mtime.subsec_nanos(),
                dev: 0,
                ino: 0,
                size: meta.len(),
            }))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(IndexError::Io(e)),
    }
}

/// Per-path cache: the parsed index plus the file stats it was parsed from.
struct SlotState {
    index: Index,
    loaded: bool,
    stat: Option<IndexFileStat>,
}

struct CacheSlot {
    state: Mutex<SlotState>,
}

fn registry() -> &'static Mutex<HashMap<PathBuf, Arc<CacheSlot>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Arc<CacheSlot>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Run `f` inside the index critical section for `index_path`.
///
/// The guard exposes reads and mutations; mutations mark the index dirty and
/// are persisted (with the checksum trailer recomputed) when the closure
/// returns successfully. If the closure fails, nothing is persisted and the
/// cache is invalidated so the next acquire re-reads the on-disk state.
pub fn acquire<T, F>(index_path: &Path, f: F) -> Result<T, IndexError>
where
    F: FnOnce(&mut IndexGuard<'_>) -> Result<T, IndexError>,
{
    let slot = {
        let mut reg = registry().lock().unwrap();
        reg.entry(index_path.to_path_buf())
            .or_insert_with(|| {
                Arc::new(CacheSlot {
                    state: Mutex::new(SlotState {
                        index: Index::new(),
                        loaded: false,
                        stat: None,
                    }),
                })
            })
            .clone()
    };

    let mut locked = slot.state.lock().unwrap();
    let SlotState {
        index,
        loaded,
        stat,
    } = &mut *locked;

    // Reload when never loaded or when the file changed under us.
    let on_disk = stat_index_file(index_path)?;
    if !*loaded || *stat != on_disk {
        *index = Index::read_from(index_path)?;
        *stat = on_disk;
        *loaded = true;
    }

    let mut guard = IndexGuard {
        index: &mut *index,
        dirty: false,
    };

    let result = match f(&mut guard) {
        Ok(v) => v,
        Err(e) => {
            // The closure may have mutated the in-memory index before
            // failing; invalidate so the next acquire reloads from disk.
            *loaded = false;
            return Err(e);
        }
    };

    let dirty = guard.dirty;
    if dirty {
        if let Err(e) = index.write_to(index_path) {
            *loaded = false;
            return Err(e);
        }
        *stat = stat_index_file(index_path)?;
    }

    Ok(result)
}

/// Mutable view of the cached index inside an [`acquire`] critical section.
pub struct IndexGuard<'a> {
    index: &'a mut Index,
    dirty: bool,
}

impl IndexGuard<'_> {
    /// Read-only access to the underlying index.
    pub fn index(&self) -> &Index {
        self.index
    }

    /// Get an entry by path and stage.
    pub fn get(&self, path: &BStr, stage: Stage) -> Option<&IndexEntry> {
        self.index.get(path, stage)
    }

    /// Paths with any non-zero-stage entry.
    pub fn conflicted_paths(&self) -> Vec<BString> {
        self.index.conflicted_paths()
    }

    /// Whether any conflict stages exist.
    pub fn has_unmerged_entries(&self) -> bool {
        self.index.iter().any(|e| e.stage != Stage::Normal)
    }

    /// Stage a path at stage 0, replacing any previous entry and clearing
    /// conflict stages (staging a resolution is how conflicts end).
    pub fn insert(&mut self, path: &BStr, oid: ObjectId, mode: FileMode, stat: StatData) {
        self.index.remove_all_stages(path);
        self.index.add(IndexEntry {
            path: BString::from(path),
            oid,
            mode,
            stage: Stage::Normal,
            stat,
            flags: EntryFlags::default(),
        });
        self.dirty = true;
    }

    /// Remove every stage of a path.
    pub fn remove(&mut self, path: &BStr) {
        if self.index.remove_all_stages(path) {
            self.dirty = true;
        }
    }

    /// Record an unresolved conflict: drop the stage-0 entry and insert
    /// stages 1 (base), 2 (ours), 3 (theirs) for the sides that exist.
    pub fn write_conflict(
        &mut self,
        path: &BStr,
        stat: StatData,
        base: Option<(ObjectId, FileMode)>,
        ours: Option<(ObjectId, FileMode)>,
        theirs: Option<(ObjectId, FileMode)>,
    ) {
        self.index.remove_all_stages(path);

        for (stage, side) in [
            (Stage::Base, base),
            (Stage::Ours, ours),
            (Stage::Theirs, theirs),
        ] {
            if let Some((oid, mode)) = side {
                self.index.add(IndexEntry {
                    path: BString::from(path),
                    oid,
                    mode,
                    stage,
                    stat,
                    flags: EntryFlags::default(),
                });
            }
        }
        self.dirty = true;
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.index.clear();
        self.dirty = true;
    }

    /// Build tree objects from the stage-0 entries, returning the root OID.
    /// Does not dirty the index.
    pub fn write_tree(&self, odb: &ObjectStore, persist: bool) -> Result<ObjectId, IndexError> {
        self.index.write_tree(odb, persist)
    }
}
