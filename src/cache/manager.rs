//! File-backed cache store
//!
//! Every key maps to one JSON file in an XDG-compliant cache directory. The
//! file's modification time is the entry's `storedAt`.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use std::fs;
use std::io;
use std::path::PathBuf;

use super::CacheStore;

/// Manages reading and writing cache entries on disk
///
/// Entries live in `~/.cache/covidash/` on Linux (or the platform equivalent).
/// Keys are used verbatim as file stems, so callers namespace them.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl CacheManager {
    /// Creates a new CacheManager using the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "covidash")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a new CacheManager with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Directory holding the cache files
    pub fn dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// Returns the path to a cache file for the given key
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }
}

impl CacheStore for CacheManager {
    fn exists(&self, key: &str) -> bool {
        self.cache_path(key).is_file()
    }

    fn modified_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let modified = fs::metadata(self.cache_path(key)).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    fn read(&self, key: &str) -> io::Result<Vec<u8>> {
        fs::read(self.cache_path(key))
    }

    /// Writes through a temporary file renamed into place
    fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        self.ensure_dir()?;

        let path = self.cache_path(key);
        let tmp_path = self.cache_dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp_path, bytes)?;
        fs::rename(tmp_path, path)
    }
}
