//! Keyed lock that serializes work on the same content digest.

use crate::core::hasher::ContentDigest;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

/// Set of digests currently being worked on
#[derive(Debug, Default)]
pub struct DigestGuard {
    held: Mutex<HashSet<ContentDigest>>,
    released: Condvar,
}

/// Held while a digest is being worked on; released on drop
#[derive(Debug)]
pub struct DigestLock<'a> {
    guard: &'a DigestGuard,
    digest: ContentDigest,
}

impl DigestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no one else holds `digest`, then take it
    pub fn lock(&self, digest: ContentDigest) -> DigestLock<'_> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(&digest) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(digest);

        DigestLock {
            guard: self,
            digest,
        }
    }
}

impl Drop for DigestLock<'_> {
    fn drop(&mut self) {
        let mut held = self
            .guard
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.digest);
        self.guard.released.notify_all();
    }
}
