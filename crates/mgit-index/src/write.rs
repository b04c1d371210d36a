//! Index file writing and tree construction.

use std::io::Write;
use std::path::Path;

use mgit_hash::hasher::Hasher;
use mgit_hash::ObjectId;
use mgit_object::{FileMode, ObjectType, Tree, TreeEntry};
use mgit_odb::ObjectStore;
use mgit_utils::lockfile::LockFile;

use crate::entry::IndexEntry;
use crate::{Index, IndexError, Stage};

/// Magic bytes at the start of every index file.
const INDEX_SIGNATURE: &[u8; 4] = b"DIRC";

/// Write the index to a file atomically using a lock file.
pub fn write_index(index: &Index, path: &Path) -> Result<(), IndexError> {
    let mut lock = LockFile::acquire(path).map_err(|_| IndexError::LockFailed {
        path: path.to_path_buf(),
    })?;

    let data = serialize_index(index)?;
    lock.write_all(&data)?;
    lock.commit().map_err(|_| IndexError::LockFailed {
        path: path.to_path_buf(),
    })?;

    Ok(())
}

/// Serialize the index to bytes.
///
/// The trailing 20 bytes are the SHA-1 of everything before them; after every
/// mutation the persisted file satisfies this invariant by construction.
pub fn serialize_index(index: &Index) -> Result<Vec<u8>, IndexError> {
    let mut buf = Vec::new();

    // Header
    buf.extend_from_slice(INDEX_SIGNATURE);
    buf.extend_from_slice(&2u32.to_be_bytes()); // always write v2
    buf.extend_from_slice(&(index.len() as u32).to_be_bytes());

    // Entries (already sorted by (path, stage))
    for entry in index.iter() {
        write_entry(&mut buf, entry);
    }

    // Extensions preserved from read
    for ext in index.extensions() {
        buf.extend_from_slice(&ext.signature);
        buf.extend_from_slice(&(ext.data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&ext.data);
    }

    // Checksum
    let checksum = Hasher::digest(&buf)
        .map_err(|_| IndexError::InvalidHeader("checksum computation failed".into()))?;
    buf.extend_from_slice(checksum.as_bytes());

    Ok(buf)
}

/// Write a single v2 cache entry.
fn write_entry(buf: &mut Vec<u8>, entry: &IndexEntry) {
    let entry_start = buf.len();

    // Stat data (40 bytes)
    buf.extend_from_slice(&entry.stat.ctime_secs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.ctime_nsecs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.mtime_secs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.mtime_nsecs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.dev.to_be_bytes());
    buf.extend_from_slice(&entry.stat.ino.to_be_bytes());
    buf.extend_from_slice(&entry.mode.raw().to_be_bytes());
    buf.extend_from_slice(&entry.stat.uid.to_be_bytes());
    buf.extend_from_slice(&entry.stat.gid.to_be_bytes());
    buf.extend_from_slice(&entry.stat.size.to_be_bytes());

    // OID (20 bytes)
    buf.extend_from_slice(entry.oid.as_bytes());

    // Flags (16 bits)
    let name_len = std::cmp::min(entry.path.len(), 0xFFF) as u16;
    let mut flags: u16 = name_len;
    flags |= (entry.stage.as_u8() as u16) << 12;
    if entry.flags.assume_valid {
        flags |= 0x8000;
    }
    buf.extend_from_slice(&flags.to_be_bytes());

    // Path
    buf.extend_from_slice(&entry.path);

    // Pad using C git formula: entry_size = ((40 + 20 + 2 + name_len + 8) & ~7)
    // The padding fills with NUL bytes from after the path to the end of the entry
    let entry_size = (40 + 20 + 2 + entry.path.len() + 8) & !7;
    let current_len = buf.len() - entry_start;
    for _ in 0..entry_size - current_len {
        buf.push(0);
    }
}

/// Create a tree hierarchy from the current index entries.
///
/// Only stage-0 entries participate. With `persist = false` the subtree
/// objects are hashed but never written.
pub fn write_tree_from_index(
    index: &Index,
    odb: &ObjectStore,
    persist: bool,
) -> Result<ObjectId, IndexError> {
    let entries: Vec<&IndexEntry> = index.iter().filter(|e| e.stage == Stage::Normal).collect();

    if entries.is_empty() {
        return put_tree(odb, &Tree::new(), persist);
    }

    build_tree(&entries, b"", odb, persist)
}

/// Recursively build tree objects from sorted index entries.
fn build_tree(
    entries: &[&IndexEntry],
    prefix: &[u8],
    odb: &ObjectStore,
    persist: bool,
) -> Result<ObjectId, IndexError> {
    let mut tree_entries: Vec<TreeEntry> = Vec::new();
    let mut i = 0;

    while i < entries.len() {
        let entry = entries[i];
        let path = &entry.path[prefix.len()..];

        if let Some(slash_pos) = path.iter().position(|&b| b == b'/') {
            // This is a subtree entry
            let dir_name = &path[..slash_pos];
            // Collect all entries under this subtree
            let subtree_end = entries[i..]
                .iter()
                .position(|e| {
                    let p = &e.path[prefix.len()..];
                    !p.starts_with(dir_name) || (p.len() > slash_pos && p[slash_pos] != b'/')
                })
                .map(|pos| i + pos)
                .unwrap_or(entries.len());

            let subtree_entries = &entries[i..subtree_end];

            let mut new_prefix = prefix.to_vec();
            new_prefix.extend_from_slice(dir_name);
            new_prefix.push(b'/');

            let subtree_oid = build_tree(subtree_entries, &new_prefix, odb, persist)?;

            tree_entries.push(TreeEntry {
                mode: FileMode::Tree,
                name: dir_name.into(),
                oid: subtree_oid,
            });

            i = subtree_end;
        } else {
            // Direct entry (blob/symlink/gitlink)
            tree_entries.push(TreeEntry {
                mode: entry.mode,
                name: path.into(),
                oid: entry.oid,
            });
            i += 1;
        }
    }

    let mut tree = Tree::new();
    tree.entries = tree_entries;
    tree.sort();
    put_tree(odb, &tree, persist)
}

/// Write or merely hash a tree object depending on `persist`.
fn put_tree(odb: &ObjectStore, tree: &Tree, persist: bool) -> Result<ObjectId, IndexError> {
    let content = tree.serialize_content();
    if persist {
        Ok(odb.write_raw(ObjectType::Tree, &content)?)
    } else {
        Ok(ObjectStore::hash_raw(ObjectType::Tree, &content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryFlags, StatData};
    use bstr::BString;

    fn blob_entry(path: &str, oid_byte: u8) -> IndexEntry {
        IndexEntry {
            path: BString::from(path),
            oid: ObjectId::from([oid_byte; 20]),
            mode: FileMode::Regular,
            stage: Stage::Normal,
            stat: StatData::default(),
            flags: EntryFlags::default(),
        }
    }

    #[test]
    fn serialize_parse_roundtrip() {
        let mut index = Index::new();
        index.add(blob_entry("a.txt", 1));
        index.add(blob_entry("dir/b.txt", 2));

        let data = serialize_index(&index).unwrap();
        let parsed = crate::read::parse_index(&data).unwrap();
        assert_eq!(parsed.len(), 2);

        let paths: Vec<_> = parsed.iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![BString::from("a.txt"), BString::from("dir/b.txt")]);
    }

    #[test]
    fn checksum_trailer_is_valid() {
        let mut index = Index::new();
        index.add(blob_entry("a.txt", 1));

        let data = serialize_index(&index).unwrap();
        let content = &data[..data.len() - 20];
        let checksum = Hasher::digest(content).unwrap();
        assert_eq!(checksum.as_bytes(), &data[data.len() - 20..]);
    }

    #[test]
    fn empty_index_writes_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let odb = ObjectStore::open(dir.path().join("objects"));

        let index = Index::new();
        let oid = index.write_tree(&odb, true).unwrap();
        assert_eq!(oid, ObjectId::EMPTY_TREE);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let odb = ObjectStore::open(dir.path().join("objects"));

        let mut index = Index::new();
        index.add(blob_entry("dir/file.txt", 3));

        let dry = index.write_tree(&odb, false).unwrap();
        assert!(!odb.contains(&dry));

        let wet = index.write_tree(&odb, true).unwrap();
        assert_eq!(dry, wet);
        assert!(odb.contains(&wet));
    }

    #[test]
    fn nested_directories_group_correctly() {
        let dir = tempfile::tempdir().unwrap();
        let odb = ObjectStore::open(dir.path().join("objects"));

        let mut index = Index::new();
        index.add(blob_entry("a/x.txt", 1));
        index.add(blob_entry("a/y.txt", 2));
        index.add(blob_entry("b.txt", 3));

        let root_oid = index.write_tree(&odb, true).unwrap();
        let root = match odb.read(&root_oid).unwrap().unwrap() {
            mgit_object::Object::Tree(t) => t,
            _ => panic!("expected tree"),
        };
        let names: Vec<_> = root.iter().map(|e| e.name.to_string()).collect();
        assert_eq!(names, vec!["a", "b.txt"]);
        assert!(root.entries[0].mode.is_tree());
    }
}
