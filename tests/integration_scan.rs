//! Integration tests for scan mode.
//!
//! These tests verify end-to-end walker behavior including:
//! - Duplicate detection and relocation
//! - The directory freshness gate
//! - Recovery when a canonical file disappears

use assert_fs::prelude::*;
use assert_fs::TempDir;
use media_manager::core::hasher::ContentHasher;
use media_manager::core::index::{IndexKey, KeyValueIndex, Namespace, SqliteIndex};
use media_manager::core::processor::{FileProcessor, ProcessMode, ProcessorConfig};
use media_manager::core::walker::DirectoryWalker;
use media_manager::error::WalkError;
use predicates::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

struct Archive {
    temp: TempDir,
    media: PathBuf,
    dupes: PathBuf,
    index: Arc<SqliteIndex>,
}

impl Archive {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        let media = root.join("media");
        let dupes = root.join("duplicates");
        fs::create_dir_all(&media).unwrap();

        let index = Arc::new(SqliteIndex::open(&root.join("index.sqlite3")).unwrap());

        Self {
            temp,
            media,
            dupes,
            index,
        }
    }

    fn walker(&self, move_duplicates: bool) -> DirectoryWalker {
        let config = ProcessorConfig::new(
            ProcessMode::Scan { move_duplicates },
            &self.media,
            &self.dupes,
        )
        .skip_files([".DS_Store"]);

        DirectoryWalker::builder(FileProcessor::new(config, self.index.clone()))
            .max_workers(4)
            .exclude(&self.dupes)
            .build()
    }

    fn canonical_for(&self, path: &Path) -> Option<String> {
        let digest = ContentHasher::new().hash_file(path).unwrap();
        self.index.get(&IndexKey::Content(digest)).unwrap()
    }
}

/// Push a directory's mtime forward so the next scan sees it as changed
fn touch_dir(dir: &Path) {
    let later = SystemTime::now() + Duration::from_secs(60);
    File::open(dir).unwrap().set_modified(later).unwrap();
}

#[test]
fn duplicate_is_moved_and_original_stays_canonical() {
    let archive = Archive::new();
    let a = archive.media.join("a.jpg");
    fs::write(&a, b"same bytes").unwrap();

    archive.walker(true).run(&archive.media).unwrap();
    assert_eq!(archive.canonical_for(&a), Some(a.to_string_lossy().into_owned()));

    let b = archive.media.join("trip").join("b.jpg");
    fs::create_dir_all(b.parent().unwrap()).unwrap();
    fs::write(&b, b"same bytes").unwrap();

    let summary = archive.walker(true).run(&archive.media).unwrap();

    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.relocated, 1);
    assert!(!b.exists());

    let moved = archive.temp.child("duplicates/trip/b.jpg");
    moved.assert(predicate::path::exists());
    assert_eq!(fs::read(moved.path()).unwrap(), b"same bytes");
    assert_eq!(archive.canonical_for(&a), Some(a.to_string_lossy().into_owned()));
}

#[test]
fn duplicate_stays_put_without_relocation() {
    let archive = Archive::new();
    fs::write(archive.media.join("a.jpg"), b"same bytes").unwrap();
    archive.walker(false).run(&archive.media).unwrap();

    let b = archive.media.join("later").join("b.jpg");
    fs::create_dir_all(b.parent().unwrap()).unwrap();
    fs::write(&b, b"same bytes").unwrap();

    let summary = archive.walker(false).run(&archive.media).unwrap();

    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.relocated, 0);
    assert!(b.exists());
    archive.temp.child("duplicates").assert(predicate::path::missing());
}

#[test]
fn relocated_duplicates_never_overwrite_each_other() {
    let archive = Archive::new();
    fs::write(archive.media.join("a.jpg"), b"same bytes").unwrap();
    archive.walker(true).run(&archive.media).unwrap();

    archive
        .temp
        .child("duplicates/b.jpg")
        .write_binary(b"an earlier duplicate")
        .unwrap();
    fs::write(archive.media.join("b.jpg"), b"same bytes").unwrap();
    touch_dir(&archive.media);

    archive.walker(true).run(&archive.media).unwrap();

    assert_eq!(
        fs::read(archive.dupes.join("b.jpg")).unwrap(),
        b"an earlier duplicate"
    );
    archive
        .temp
        .child("duplicates/b_001.jpg")
        .assert(predicate::path::is_file());
}

#[test]
fn unchanged_directory_is_not_rehashed() {
    let archive = Archive::new();
    let photo = archive.media.join("a.jpg");
    fs::write(&photo, b"original").unwrap();
    archive.walker(false).run(&archive.media).unwrap();

    // Rewriting a file in place leaves the directory mtime alone
    fs::write(&photo, b"edited").unwrap();
    let summary = archive.walker(false).run(&archive.media).unwrap();

    assert_eq!(summary.directories_skipped, 1);
    assert_eq!(summary.files_total(), 0);
    assert_eq!(archive.canonical_for(&photo), None);
}

#[test]
fn changed_directory_is_processed_again() {
    let archive = Archive::new();
    fs::write(archive.media.join("a.jpg"), b"a").unwrap();
    archive.walker(false).run(&archive.media).unwrap();

    let added = archive.media.join("b.jpg");
    fs::write(&added, b"b").unwrap();
    touch_dir(&archive.media);

    let summary = archive.walker(false).run(&archive.media).unwrap();

    assert_eq!(summary.directories_processed, 1);
    assert_eq!(summary.recorded, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(
        archive.canonical_for(&added),
        Some(added.to_string_lossy().into_owned())
    );
}

#[test]
fn missing_canonical_is_replaced() {
    let archive = Archive::new();
    let original = archive.media.join("first").join("a.jpg");
    fs::create_dir_all(original.parent().unwrap()).unwrap();
    fs::write(&original, b"content").unwrap();
    archive.walker(false).run(&archive.media).unwrap();

    let digest = ContentHasher::new().hash_file(&original).unwrap();
    fs::remove_file(&original).unwrap();

    let successor = archive.media.join("second").join("a-copy.jpg");
    fs::create_dir_all(successor.parent().unwrap()).unwrap();
    fs::write(&successor, b"content").unwrap();

    let summary = archive.walker(false).run(&archive.media).unwrap();

    assert_eq!(summary.recorded, 1);
    assert_eq!(
        archive.index.get(&IndexKey::Content(digest)).unwrap(),
        Some(successor.to_string_lossy().into_owned())
    );
}

#[test]
fn skip_list_and_directory_stamps() {
    let archive = Archive::new();
    fs::write(archive.media.join(".DS_Store"), b"finder junk").unwrap();
    fs::create_dir_all(archive.media.join("empty")).unwrap();

    let summary = archive.walker(false).run(&archive.media).unwrap();

    assert_eq!(summary.ignored, 1);
    assert_eq!(archive.index.entries(Namespace::Content).unwrap().len(), 0);
    // Both the root and the empty subdirectory are stamped
    assert_eq!(archive.index.entries(Namespace::Directory).unwrap().len(), 2);
}

#[test]
fn missing_root_is_a_run_error() {
    let archive = Archive::new();
    let result = archive.walker(false).run(&archive.media.join("nope"));
    assert!(matches!(result, Err(WalkError::DirectoryNotFound { .. })));
}
