//! Memoized whole-file content hashing.
//!
//! The digests produced here are plain (unsalted) sha256 of the file
//! contents, so they can be compared against file hashes computed elsewhere.
//! They are not the same as the digests produced by [crate::hash::Hash].
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::hash::HASH_SIZE;
use crate::Error;

/// Opens files for reading by path.
pub trait FileSource: Send + Sync {
    fn open(&self, path: &Path) -> std::io::Result<Box<dyn Read + Send>>;
}

/// A [FileSource] reading from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsFileSource;

impl FileSource for OsFileSource {
    fn open(&self, path: &Path) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }
}

/// Hashes files, caching the digest of each path for the lifetime of the
/// [FileHasher].
///
/// Entries are never invalidated; a file changing after it was first hashed
/// goes unnoticed. The lock only guards the map, not the I/O, so concurrent
/// misses for the same path may both read the file. They converge on the
/// same digest.
pub struct FileHasher<S = OsFileSource> {
    source: S,
    cache: Mutex<HashMap<PathBuf, [u8; HASH_SIZE]>>,
}

impl FileHasher<OsFileSource> {
    pub fn new() -> Self {
        Self::with_source(OsFileSource)
    }
}

impl Default for FileHasher<OsFileSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: FileSource> FileHasher<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the sha256 digest of the contents of the file at `path`.
    ///
    /// Repeated lookups of the same path are answered from the cache. The
    /// cache entry can be populated upfront with [FileHasher::set_file_hash].
    #[instrument(skip(self, path), fields(path = %path.display()), err)]
    pub fn hash_file(&self, path: &Path) -> Result<[u8; HASH_SIZE], Error> {
        if let Some(digest) = self.cache.lock().get(path) {
            debug!("file hash cache hit");
            return Ok(*digest);
        }

        let io_err = |source: std::io::Error| Error::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut r = self.source.open(path).map_err(io_err)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut r, &mut hasher).map_err(io_err)?;
        let digest: [u8; HASH_SIZE] = hasher.finalize().into();

        self.set_file_hash(path, digest);
        Ok(digest)
    }

    /// Sets the digest returned by [FileHasher::hash_file] for `path`,
    /// replacing any previous entry.
    pub fn set_file_hash(&self, path: &Path, digest: [u8; HASH_SIZE]) {
        self.cache.lock().insert(path.to_path_buf(), digest);
    }

    /// Returns the number of cached digests.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
