//! In-memory index backend for testing.

use super::{IndexKey, KeyValueIndex, Namespace};
use crate::error::IndexError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// In-memory index backend
///
/// Useful for testing and dry runs where persistence isn't needed.
pub struct InMemoryIndex {
    entries: RwLock<BTreeMap<(Namespace, String), String>>,
}

impl InMemoryIndex {
    /// Create a new in-memory index
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    fn poisoned() -> IndexError {
        IndexError::Poisoned {
            path: PathBuf::from("memory"),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueIndex for InMemoryIndex {
    fn get(&self, key: &IndexKey) -> Result<Option<String>, IndexError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.get(&(key.namespace(), key.key())).cloned())
    }

    fn put(&self, key: &IndexKey, value: &str) -> Result<(), IndexError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.insert((key.namespace(), key.key()), value.to_string());
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &IndexKey,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, IndexError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        let slot = (key.namespace(), key.key());

        if entries.get(&slot).map(String::as_str) != expected {
            return Ok(false);
        }

        entries.insert(slot, new.to_string());
        Ok(true)
    }

    fn entries(&self, namespace: Namespace) -> Result<Vec<(String, String)>, IndexError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;

        Ok(entries
            .iter()
            .filter(|((ns, _), _)| *ns == namespace)
            .map(|((_, key), value)| (key.clone(), value.clone()))
            .collect())
    }
}
