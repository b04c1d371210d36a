//! Object database for the mgit git client.
//!
//! Objects live as loose files at `.git/objects/XX/YYYY...` where `XX` is the
//! first byte of the OID in hex and `YYYY...` is the rest. The file content is
//! zlib-compressed `"<type> <size>\0<content>"`. The store is content
//! addressed: writing the same bytes always yields the same OID and path, so
//! concurrent writers are benign.

mod read;
mod write;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use mgit_hash::{HashError, ObjectId};
use mgit_object::cache::ObjectCache;
use mgit_object::{Object, ObjectError, ObjectType};

/// Errors from object database operations.
#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: String, reason: String },

    #[error("object {oid} payload length {actual} does not match header length {expected}")]
    SizeMismatch {
        oid: String,
        expected: usize,
        actual: usize,
    },

    #[error("decompression error for {oid}: {source}")]
    Decompress {
        oid: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("object parse error: {0}")]
    Object(#[from] ObjectError),

    #[error("hash error: {0}")]
    Hash(#[from] HashError),
}

/// Handle to the loose object directory (`.git/objects/`).
pub struct ObjectStore {
    /// Path to the objects directory.
    objects_dir: PathBuf,
    /// Zlib compression level.
    compression_level: flate2::Compression,
    /// Parsed-object cache for read-heavy walks.
    cache: Mutex<ObjectCache>,
}

impl ObjectStore {
    /// Open the object store at the given objects directory.
    pub fn open(objects_dir: impl AsRef<Path>) -> Self {
        Self {
            objects_dir: objects_dir.as_ref().to_path_buf(),
            compression_level: flate2::Compression::default(),
            cache: Mutex::new(ObjectCache::new(1024)),
        }
    }

    /// Set the zlib compression level (0–9).
    pub fn set_compression_level(&mut self, level: u32) {
        self.compression_level = flate2::Compression::new(level);
    }

    /// Get the file path for a given OID.
    pub fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.objects_dir.join(oid.loose_path())
    }

    /// Path to the objects directory.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Read an object through the parsed-object cache.
    pub fn read_cached(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(obj) = cache.get(oid) {
                return Ok(Some(obj.clone()));
            }
        }

        let obj = self.read(oid)?;

        if let Some(ref obj) = obj {
            let mut cache = self.cache.lock().unwrap();
            cache.insert(*oid, obj.clone());
        }

        Ok(obj)
    }

    /// Compute the OID an object would be stored under without writing it.
    ///
    /// This is the dry-run form of [`write_raw`](Self::write_raw): same
    /// framing, same hash, no filesystem effect.
    pub fn hash_raw(obj_type: ObjectType, content: &[u8]) -> Result<ObjectId, OdbError> {
        Ok(mgit_hash::hasher::Hasher::hash_object(
            obj_type.as_str(),
            content,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_fanout() {
        let store = ObjectStore::open("/tmp/objects");
        let oid = ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
        assert_eq!(
            store.object_path(&oid),
            PathBuf::from("/tmp/objects/da/39a3ee5e6b4b0d3255bfef95601890afd80709")
        );
    }

    #[test]
    fn hash_raw_matches_git() {
        let oid = ObjectStore::hash_raw(ObjectType::Blob, b"hello world").unwrap();
        assert_eq!(oid.to_hex(), "95d09f2b10159347eece71399a7e2e907ea3df4f");
    }
}
