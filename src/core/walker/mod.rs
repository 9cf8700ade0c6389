//! # Walker Module
//!
//! Depth-first traversal that feeds files to the [`FileProcessor`].
//!
//! ## Order
//! Every subdirectory is finished before the directory's own files are
//! touched. Files of one directory run in parallel on a pool of
//! `max_workers` threads; directories themselves are visited one at a time.
//!
//! ## Freshness Gate
//! After a directory's files are done, its mtime is stored in the index. On
//! the next scan, a directory whose mtime is not newer than the stored stamp
//! is skipped without hashing anything. Import mode always processes.

use crate::core::index::{decode_mtime, encode_mtime, IndexKey};
use crate::core::processor::{FileOutcome, FileProcessor};
use crate::error::{IndexError, WalkError};
use crate::events::{
    null_sender, Event, EventSender, FileEvent, RunEvent, WalkEvent, WalkSummary,
};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Worker threads per directory batch unless configured
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Builder for [`DirectoryWalker`]
pub struct DirectoryWalkerBuilder {
    processor: FileProcessor,
    max_workers: usize,
    exclude: Vec<PathBuf>,
}

impl DirectoryWalkerBuilder {
    /// Worker threads per directory (at least one)
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Never descend into this directory
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }

    pub fn build(self) -> DirectoryWalker {
        DirectoryWalker {
            processor: self.processor,
            max_workers: self.max_workers,
            exclude: self.exclude,
        }
    }
}

/// Walks a tree and processes its files
pub struct DirectoryWalker {
    processor: FileProcessor,
    max_workers: usize,
    exclude: Vec<PathBuf>,
}

/// Immediate children of a directory
#[derive(Debug, Default)]
struct Listing {
    files: Vec<PathBuf>,
    directories: Vec<PathBuf>,
}

impl DirectoryWalker {
    pub fn builder(processor: FileProcessor) -> DirectoryWalkerBuilder {
        DirectoryWalkerBuilder {
            processor,
            max_workers: DEFAULT_MAX_WORKERS,
            exclude: Vec::new(),
        }
    }

    pub fn processor(&self) -> &FileProcessor {
        &self.processor
    }

    /// Walk without events
    pub fn run(&self, root: &Path) -> Result<WalkSummary, WalkError> {
        self.run_with_events(root, &null_sender())
    }

    /// Walk `root`, reporting progress through `events`
    pub fn run_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<WalkSummary, WalkError> {
        let start_time = Instant::now();

        let root = fs::canonicalize(root).map_err(|_| WalkError::DirectoryNotFound {
            path: root.to_path_buf(),
        })?;
        if !root.is_dir() {
            return Err(WalkError::DirectoryNotFound { path: root });
        }

        let excluded: Vec<PathBuf> = self
            .exclude
            .iter()
            .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
            .collect();

        events.send(Event::Run(RunEvent::Started {
            root: root.clone(),
            mode: self.processor.mode(),
        }));

        let mut summary = WalkSummary::default();
        let result = self.walk_directory(&root, &excluded, events, &mut summary);
        summary.duration_ms = start_time.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                events.send(Event::Run(RunEvent::Completed {
                    summary: summary.clone(),
                }));
                Ok(summary)
            }
            Err(e) => {
                events.send(Event::Run(RunEvent::Error {
                    message: e.to_string(),
                }));
                Err(e)
            }
        }
    }

    fn walk_directory(
        &self,
        dir: &Path,
        excluded: &[PathBuf],
        events: &EventSender,
        summary: &mut WalkSummary,
    ) -> Result<(), WalkError> {
        info!("Analyzing directory {}", dir.display());
        let listing = list_directory(dir)?;

        for subdir in &listing.directories {
            if excluded.iter().any(|x| x == subdir) {
                debug!("Not descending into excluded {}", subdir.display());
                continue;
            }

            match self.walk_directory(subdir, excluded, events, summary) {
                Err(WalkError::ReadDirectory { path, source }) => {
                    warn!("Cannot read {}: {}", path.display(), source);
                    events.send(Event::Walk(WalkEvent::Error {
                        path,
                        message: source.to_string(),
                    }));
                    summary.directories_unreadable += 1;
                }
                other => other?,
            }
        }

        self.process_files(dir, &listing.files, events, summary)
    }

    /// Apply the freshness gate, process a directory's files, then stamp it
    fn process_files(
        &self,
        dir: &Path,
        files: &[PathBuf],
        events: &EventSender,
        summary: &mut WalkSummary,
    ) -> Result<(), WalkError> {
        let mtime = fs::metadata(dir)
            .and_then(|m| m.modified())
            .map_err(|e| WalkError::ReadDirectory {
                path: dir.to_path_buf(),
                source: e,
            })?;

        let index = self.processor.index();
        let key = IndexKey::directory(dir);
        let stamp = index.get(&key)?.as_deref().and_then(decode_mtime);

        let needed = self.processor.mode().is_import() || stamp.map_or(true, |s| mtime > s);
        if !needed {
            debug!("Skipping processing for {}", dir.display());
            events.send(Event::Walk(WalkEvent::DirectorySkipped {
                path: dir.to_path_buf(),
            }));
            summary.directories_skipped += 1;
            return Ok(());
        }

        info!("Processing {} files in {}", files.len(), dir.display());
        events.send(Event::Walk(WalkEvent::DirectoryStarted {
            path: dir.to_path_buf(),
            files: files.len(),
        }));

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .thread_name(|i| format!("media-worker-{i}"))
            .build()
            .map_err(|e| WalkError::WorkerPool(e.to_string()))?;

        let results: Vec<Result<FileOutcome, IndexError>> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let result = self.processor.process(path);
                    if let Ok(outcome) = &result {
                        events.send(Event::File(FileEvent::Processed {
                            path: path.clone(),
                            outcome: outcome.clone(),
                        }));
                    }
                    result
                })
                .collect()
        });

        let mut succeeded = 0;
        let mut failed = 0;
        let mut index_failure = None;

        for result in results {
            match result {
                Ok(outcome) => {
                    if outcome.is_success() {
                        succeeded += 1;
                    } else {
                        failed += 1;
                    }
                    summary.record(&outcome);
                }
                Err(e) => {
                    index_failure.get_or_insert(e);
                }
            }
        }

        // The directory stays unstamped so the next run retries it
        if let Some(e) = index_failure {
            return Err(e.into());
        }

        index.put(&key, &encode_mtime(mtime))?;
        summary.directories_processed += 1;

        info!("Completed processing directory {}", dir.display());
        events.send(Event::Walk(WalkEvent::DirectoryCompleted {
            path: dir.to_path_buf(),
            succeeded,
            failed,
        }));

        Ok(())
    }
}

/// Split a directory's children into files and subdirectories, by name.
///
/// Symlinked files are included; symlinked directories are not followed.
fn list_directory(dir: &Path) -> Result<Listing, WalkError> {
    let mut listing = Listing::default();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(WalkError::ReadDirectory {
                    path: dir.to_path_buf(),
                    source: e.into(),
                })
            }
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let file_type = entry.file_type();
        let path = entry.into_path();

        if file_type.is_dir() {
            listing.directories.push(path);
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            listing.files.push(path);
        } else {
            debug!("Ignoring {}", path.display());
        }
    }

    Ok(listing)
}
