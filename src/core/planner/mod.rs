//! # Planner Module
//!
//! Decides where a file lands in the archive and claims that spot.
//!
//! ## Layout
//! ```text
//! <archive>/<YYYY>/<YYYY-MM-DD>[ - <place>]/<filename>
//! <archive>/Unsorted/<filename>            (no capture time at all)
//! ```
//!
//! ## Collisions
//! A taken name gets a counter before the extension: `IMG_1.jpg`,
//! `IMG_1_001.jpg`, `IMG_1_002.jpg`, ... Names are claimed by creating the
//! file with `create_new`, so two workers can never end up with the same one.

mod transfer;

pub use transfer::{copy_into, move_into};

use crate::core::metadata::MetadataRecord;
use crate::error::TransferError;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Folder for files with no usable capture time
pub const UNSORTED_FOLDER: &str = "Unsorted";

/// Gives up after this many numbered attempts
const MAX_COLLISIONS: u32 = 100_000;

/// Computes destination paths under an archive root
#[derive(Debug, Clone)]
pub struct DestinationPlanner {
    archive_root: PathBuf,
}

impl DestinationPlanner {
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
        }
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    /// Folder (relative to the archive root) for a record
    pub fn folder_for(record: &MetadataRecord) -> PathBuf {
        match (&record.capture_year, &record.capture_date) {
            (Some(year), Some(date)) => {
                let label = match &record.place_name {
                    Some(place) => format!("{} - {}", date, place),
                    None => date.clone(),
                };
                PathBuf::from(year).join(label)
            }
            _ => PathBuf::from(UNSORTED_FOLDER),
        }
    }

    /// Candidate destination, before collision handling
    pub fn plan(&self, record: &MetadataRecord, source: &Path) -> PathBuf {
        let filename = source
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "unknown".into());

        self.archive_root
            .join(Self::folder_for(record))
            .join(filename)
    }

    /// Plan a destination and claim a free name for it
    pub fn plan_and_reserve(
        &self,
        record: &MetadataRecord,
        source: &Path,
    ) -> Result<PathBuf, TransferError> {
        reserve_unique_path(&self.plan(record, source))
    }
}

/// `photo.jpg` with counter 1 becomes `photo_001.jpg`
pub fn numbered_path(path: &Path, counter: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = match path.extension() {
        Some(ext) => format!("{}_{:03}.{}", stem, counter, ext.to_string_lossy()),
        None => format!("{}_{:03}", stem, counter),
    };

    path.with_file_name(name)
}

/// Claim the first free name among `path`, `path_001`, `path_002`, ...
///
/// Creates missing parent directories, then creates an empty placeholder
/// at the chosen name. The caller fills or replaces the placeholder.
pub fn reserve_unique_path(path: &Path) -> Result<PathBuf, TransferError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TransferError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    for counter in 0..=MAX_COLLISIONS {
        let candidate = if counter == 0 {
            path.to_path_buf()
        } else {
            numbered_path(path, counter)
        };

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(TransferError::Reserve {
                    path: candidate,
                    source: e,
                })
            }
        }
    }

    Err(TransferError::Reserve {
        path: path.to_path_buf(),
        source: std::io::Error::new(ErrorKind::AlreadyExists, "no free name left"),
    })
}

/// Where a duplicate goes: its path relative to `media_root`, under
/// `duplicates_root`.
///
/// Files outside `media_root` keep their full path minus the root/prefix
/// components, so nothing can escape `duplicates_root`.
pub fn mirrored_path(path: &Path, media_root: &Path, duplicates_root: &Path) -> PathBuf {
    let relative = path.strip_prefix(media_root).unwrap_or(path);

    let cleaned: PathBuf = relative
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();

    duplicates_root.join(cleaned)
}
