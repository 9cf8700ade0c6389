//! # Core Module
//!
//! The media management engine.
//!
//! ## Modules
//! - `hasher` - Content digests
//! - `index` - Persistent key-value index (digests, directory stamps, places)
//! - `metadata` - Capture time and location from EXIF, containers, file times
//! - `geocode` - Reverse geocoding with rate limiting and caching
//! - `convert` - HEIC to JPEG conversion
//! - `planner` - Destination paths and collision-safe naming
//! - `processor` - Per-file scan and import logic
//! - `walker` - Depth-first traversal with the freshness gate

pub mod convert;
pub mod geocode;
pub mod hasher;
pub mod index;
pub mod metadata;
pub mod planner;
pub mod processor;
pub mod walker;

// Re-export commonly used types
pub use hasher::{ContentDigest, ContentHasher};
pub use index::{InMemoryIndex, KeyValueIndex, SqliteIndex};
pub use metadata::{MetadataRecord, MetadataResolver};
pub use planner::DestinationPlanner;
pub use processor::{FileOutcome, FileProcessor, ProcessMode, ProcessorConfig};
pub use walker::DirectoryWalker;
