//! # Index Module
//!
//! Durable key-value index shared by every worker in a run.
//!
//! ## Namespaces
//! One store holds three kinds of entries, kept apart by a namespace column:
//! - `hash` - content digest to canonical file path
//! - `dir` - directory path to the mtime it was last fully processed at
//! - `geo` - rounded coordinates to cached address fields (JSON)
//!
//! Keys are unique within a namespace, the last writer wins, and a missing
//! entry means "unseen".
//!
//! ## Backends
//! - `SqliteIndex` - Persistent storage using SQLite
//! - `InMemoryIndex` - For testing

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;
pub use traits::KeyValueIndex;

use crate::core::hasher::ContentDigest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Key space an entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Namespace {
    Content,
    Directory,
    Geo,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Content => "hash",
            Namespace::Directory => "dir",
            Namespace::Geo => "geo",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-qualified index key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    /// Content digest, maps to the canonical path
    Content(ContentDigest),
    /// Directory, maps to its last processed mtime
    Directory(PathBuf),
    /// Rounded coordinate pair, maps to address fields
    GeoCell(String),
}

impl IndexKey {
    pub fn directory(path: &Path) -> Self {
        IndexKey::Directory(path.to_path_buf())
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            IndexKey::Content(_) => Namespace::Content,
            IndexKey::Directory(_) => Namespace::Directory,
            IndexKey::GeoCell(_) => Namespace::Geo,
        }
    }

    /// The key as stored within its namespace
    pub fn key(&self) -> String {
        match self {
            IndexKey::Content(digest) => digest.to_hex(),
            IndexKey::Directory(path) => path.to_string_lossy().into_owned(),
            IndexKey::GeoCell(cell) => cell.clone(),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace(), self.key())
    }
}

/// Entry counts per namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub content_entries: usize,
    pub directory_entries: usize,
    pub geo_entries: usize,
}

impl IndexStats {
    pub fn total(&self) -> usize {
        self.content_entries + self.directory_entries + self.geo_entries
    }
}

/// Encode a directory mtime as stored in the `dir` namespace.
///
/// Nanoseconds since the Unix epoch, as a decimal string.
pub fn encode_mtime(time: SystemTime) -> String {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos()
        .to_string()
}

/// Decode a stored directory mtime. Unparseable values read as absent.
pub fn decode_mtime(value: &str) -> Option<SystemTime> {
    let nanos: u128 = value.trim().parse().ok()?;
    let secs = u64::try_from(nanos / 1_000_000_000).ok()?;
    let sub = (nanos % 1_000_000_000) as u32;
    Some(UNIX_EPOCH + Duration::new(secs, sub))
}
