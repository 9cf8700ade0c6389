//! Event type definitions for progress reporting.

use crate::core::processor::{FileOutcome, ProcessMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Run-level events
    Run(RunEvent),
    /// Directory traversal events
    Walk(WalkEvent),
    /// Per-file results
    File(FileEvent),
}

/// Run-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// Walk has started
    Started { root: PathBuf, mode: ProcessMode },
    /// Walk finished (every reachable directory visited)
    Completed { summary: WalkSummary },
    /// Walk aborted
    Error { message: String },
}

/// Events during directory traversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalkEvent {
    /// Files of a directory are about to be processed
    DirectoryStarted { path: PathBuf, files: usize },
    /// Directory unchanged since its last pass
    DirectorySkipped { path: PathBuf },
    /// All files of a directory finished and the directory was stamped
    DirectoryCompleted {
        path: PathBuf,
        succeeded: usize,
        failed: usize,
    },
    /// A directory could not be listed; traversal continues
    Error { path: PathBuf, message: String },
}

/// Per-file events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileEvent {
    /// A file finished processing
    Processed { path: PathBuf, outcome: FileOutcome },
}

/// Tally of a walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkSummary {
    /// Directories whose files were processed
    pub directories_processed: usize,
    /// Directories skipped by the freshness check
    pub directories_skipped: usize,
    /// Directories that could not be listed
    pub directories_unreadable: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    /// Newly recorded or replaced canonical entries (scan)
    pub recorded: usize,
    pub duplicates: usize,
    /// Duplicates moved to the duplicates root
    pub relocated: usize,
    pub imported: usize,
    /// Already canonical or already imported
    pub unchanged: usize,
    /// Skip-list files and failed conversions
    pub ignored: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl WalkSummary {
    /// Count one file outcome
    pub fn record(&mut self, outcome: &FileOutcome) {
        if outcome.is_success() {
            self.files_succeeded += 1;
        } else {
            self.files_failed += 1;
        }

        match outcome {
            FileOutcome::Recorded | FileOutcome::Replaced { .. } => self.recorded += 1,
            FileOutcome::Duplicate { relocated_to, .. } => {
                self.duplicates += 1;
                if relocated_to.is_some() {
                    self.relocated += 1;
                }
            }
            FileOutcome::Imported { .. } => self.imported += 1,
            FileOutcome::AlreadyCanonical | FileOutcome::AlreadyImported { .. } => {
                self.unchanged += 1
            }
            FileOutcome::Skipped | FileOutcome::Inert { .. } => self.ignored += 1,
            FileOutcome::Failed { .. } => {}
        }
    }

    pub fn files_total(&self) -> usize {
        self.files_succeeded + self.files_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::File(FileEvent::Processed {
            path: PathBuf::from("/photos/b.jpg"),
            outcome: FileOutcome::Duplicate {
                original: PathBuf::from("/photos/a.jpg"),
                relocated_to: None,
            },
        });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::File(FileEvent::Processed { outcome, .. }) => {
                assert!(matches!(outcome, FileOutcome::Duplicate { .. }));
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = WalkSummary::default();
        summary.record(&FileOutcome::Recorded);
        summary.record(&FileOutcome::Duplicate {
            original: PathBuf::from("/a.jpg"),
            relocated_to: Some(PathBuf::from("/dupes/b.jpg")),
        });
        summary.record(&FileOutcome::Failed {
            reason: "io".into(),
        });

        assert_eq!(summary.files_succeeded, 2);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.relocated, 1);
        assert_eq!(summary.files_total(), 3);
    }
}
