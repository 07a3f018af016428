//! Cache module for storing normalized source records on disk
//!
//! The orchestrator only talks to the [`CacheStore`] contract: existence,
//! modification time, raw reads and overwriting writes. [`CacheManager`] is the
//! file-backed implementation used by the binary. Freshness is decided by the
//! caller from `modified_at`, so stale entries stay readable as a fallback when
//! the upstream APIs are unavailable.

mod manager;

pub use manager::CacheManager;

use chrono::{DateTime, Utc};
use std::io;

/// Key/value persistence with per-key modification timestamps
///
/// Reads never touch the modification time; only a successful `write` moves it.
pub trait CacheStore: Send + Sync {
    /// Whether an entry is stored under `key`
    fn exists(&self, key: &str) -> bool;

    /// Time of the last successful write of `key`, if the entry exists
    fn modified_at(&self, key: &str) -> Option<DateTime<Utc>>;

    /// Raw bytes stored under `key`
    fn read(&self, key: &str) -> io::Result<Vec<u8>>;

    /// Overwrites the entry stored under `key`
    fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()>;
}
