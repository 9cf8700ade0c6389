//! # Hasher Module
//!
//! Computes content digests used for deduplication.
//!
//! ## Algorithm
//! xxh3-64 over the raw file bytes, streamed in fixed-size chunks so that
//! peak memory stays flat regardless of file size. The digest depends only on
//! the bytes, never on names or timestamps.
//!
//! Collisions are possible (64 bits, non-cryptographic) and are accepted.

use crate::error::HashError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;
use xxhash_rust::xxh3::Xxh3;

/// Read size for streaming hashes (64 KiB)
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Fingerprint of a file's byte content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(u64);

impl ContentDigest {
    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Lowercase, zero-padded hex form used as the index key
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for ContentDigest {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(Self)
    }
}

/// Streaming content hasher
#[derive(Debug, Clone)]
pub struct ContentHasher {
    chunk_size: usize,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Override the read size. Mostly useful in tests.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Hash a file on disk
    pub fn hash_file(&self, path: &Path) -> Result<ContentDigest, HashError> {
        let file = File::open(path).map_err(|e| HashError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.hash_reader(file).map_err(|e| HashError::Read {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Hash any reader to its end
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> std::io::Result<ContentDigest> {
        let mut hasher = Xxh3::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buffer[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(ContentDigest(hasher.digest()))
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}
