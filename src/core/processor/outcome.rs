//! Per-file results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What happened to a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOutcome {
    /// Name is on the skip list
    Skipped,
    /// First sighting, recorded as canonical
    Recorded,
    /// Took over from a canonical path that no longer exists
    Replaced { stale: PathBuf },
    /// Already the canonical copy
    AlreadyCanonical,
    /// Same content as an existing canonical file
    Duplicate {
        original: PathBuf,
        relocated_to: Option<PathBuf>,
    },
    /// Copied into the archive
    Imported { destination: PathBuf },
    /// Content is already in the archive
    AlreadyImported { canonical: PathBuf },
    /// Conversion failed; nothing was done
    Inert { reason: String },
    /// Hashing or a file operation failed
    Failed { reason: String },
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, FileOutcome::Failed { .. })
    }

    /// Short label for logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::Skipped => "skipped",
            FileOutcome::Recorded => "recorded",
            FileOutcome::Replaced { .. } => "replaced",
            FileOutcome::AlreadyCanonical => "unchanged",
            FileOutcome::Duplicate { .. } => "duplicate",
            FileOutcome::Imported { .. } => "imported",
            FileOutcome::AlreadyImported { .. } => "already imported",
            FileOutcome::Inert { .. } => "inert",
            FileOutcome::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutcome::Replaced { stale } => {
                write!(f, "replaced (was {})", stale.display())
            }
            FileOutcome::Duplicate {
                original,
                relocated_to: Some(to),
            } => write!(
                f,
                "duplicate of {}, moved to {}",
                original.display(),
                to.display()
            ),
            FileOutcome::Duplicate { original, .. } => {
                write!(f, "duplicate of {}", original.display())
            }
            FileOutcome::Imported { destination } => {
                write!(f, "imported to {}", destination.display())
            }
            FileOutcome::AlreadyImported { canonical } => {
                write!(f, "already imported as {}", canonical.display())
            }
            FileOutcome::Inert { reason } | FileOutcome::Failed { reason } => {
                write!(f, "{}: {}", self.label(), reason)
            }
            other => f.write_str(other.label()),
        }
    }
}
