//! # Media Manager
//!
//! Organizes photos and videos into a canonical, deduplicated archive.
//!
//! ## Core Philosophy
//! - **One canonical copy** - every piece of content is recorded once, by hash
//! - **Never lose a file** - duplicates are moved aside, never deleted
//! - **Only redo what changed** - unchanged directories are skipped
//!
//! ## Architecture
//! - `core` - Hashing, the index, metadata, planning and the walk itself
//! - `config` - The user's settings file
//! - `events` - Event-driven progress reporting
//! - `error` - Error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{MediaManagerError, Result};

/// Initialize tracing for the library
///
/// Logs at `info` (or `debug` with `verbose`). `RUST_LOG` takes precedence.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // A subscriber may already be installed (tests, embedding applications)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
