//! Index backend trait definition.

use super::{IndexKey, IndexStats, Namespace};
use crate::error::IndexError;

/// Trait for index backends
///
/// Implementations must be safe to share across worker threads. Each call is
/// atomic on its own; nothing spans more than one key.
pub trait KeyValueIndex: Send + Sync {
    /// Look up the value stored under a key
    fn get(&self, key: &IndexKey) -> Result<Option<String>, IndexError>;

    /// Store a value, replacing whatever was there
    fn put(&self, key: &IndexKey, value: &str) -> Result<(), IndexError>;

    /// Store `new` only if the current value equals `expected`.
    ///
    /// `expected == None` means "only if absent". Returns whether the write
    /// happened. The read and the write happen under one lock, so a caller
    /// that decided based on `expected` cannot be overtaken by another writer.
    fn compare_and_swap(
        &self,
        key: &IndexKey,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, IndexError>;

    /// All entries of a namespace, ordered by key
    fn entries(&self, namespace: Namespace) -> Result<Vec<(String, String)>, IndexError>;

    /// Entry counts per namespace
    fn stats(&self) -> Result<IndexStats, IndexError> {
        Ok(IndexStats {
            content_entries: self.entries(Namespace::Content)?.len(),
            directory_entries: self.entries(Namespace::Directory)?.len(),
            geo_entries: self.entries(Namespace::Geo)?.len(),
        })
    }
}
