//! Copying and moving files onto reserved destinations.

use crate::error::TransferError;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Copy `source` over the placeholder at `reserved`.
///
/// On failure the placeholder is removed so no empty file is left behind.
pub fn copy_into(source: &Path, reserved: &Path) -> Result<(), TransferError> {
    fs::copy(source, reserved).map(|_| ()).map_err(|e| {
        discard_placeholder(reserved);
        TransferError::Copy {
            from: source.to_path_buf(),
            to: reserved.to_path_buf(),
            source: e,
        }
    })
}

/// Move `source` onto the placeholder at `reserved`.
///
/// Falls back to copy-verify-delete when a rename is not possible (for
/// example across filesystems).
pub fn move_into(source: &Path, reserved: &Path) -> Result<(), TransferError> {
    let result = fs::rename(source, reserved).or_else(|_| {
        let source_size = fs::metadata(source)?.len();
        fs::copy(source, reserved)?;

        let dest_size = fs::metadata(reserved)?.len();
        if dest_size != source_size {
            return Err(std::io::Error::other(format!(
                "Copy verification failed: source {} bytes, dest {} bytes",
                source_size, dest_size
            )));
        }

        fs::remove_file(source)
    });

    result.map_err(|e| {
        if source.exists() {
            discard_placeholder(reserved);
        }
        TransferError::Move {
            from: source.to_path_buf(),
            to: reserved.to_path_buf(),
            source: e,
        }
    })
}

fn discard_placeholder(reserved: &Path) {
    if let Err(e) = fs::remove_file(reserved) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove placeholder {}: {}", reserved.display(), e);
        }
    }
}
