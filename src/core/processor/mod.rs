//! # Processor Module
//!
//! The per-file unit of work.
//!
//! ## Modes
//! - **Scan** - record each file's digest, detect duplicates of files already
//!   recorded, optionally move duplicates out of the media tree
//! - **Import** - copy files whose content is not yet in the archive into the
//!   dated folder layout, converting HEIC to JPEG first when a converter is set
//!
//! ## Failure Containment
//! Hashing and file operation errors become [`FileOutcome::Failed`]. Only
//! index errors are returned, since they mean the run cannot continue safely.

mod guard;
mod outcome;

pub use guard::{DigestGuard, DigestLock};
pub use outcome::FileOutcome;

use crate::core::convert::{is_heic, ImageConverter};
use crate::core::hasher::{ContentDigest, ContentHasher};
use crate::core::index::{IndexKey, KeyValueIndex};
use crate::core::metadata::MetadataResolver;
use crate::core::planner::{copy_into, mirrored_path, move_into, reserve_unique_path, DestinationPlanner};
use crate::error::{IndexError, MediaManagerError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How files are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessMode {
    /// Record files in place
    Scan { move_duplicates: bool },
    /// Copy new content into the archive
    Import,
}

impl ProcessMode {
    pub fn is_import(&self) -> bool {
        matches!(self, ProcessMode::Import)
    }
}

/// Settings for a [`FileProcessor`]
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub mode: ProcessMode,
    /// Archive root; imports land here and duplicates are mirrored relative to it
    pub media_root: PathBuf,
    /// Where scan mode moves duplicates to
    pub duplicates_root: PathBuf,
    /// Base names that are never processed
    pub skip_files: HashSet<String>,
}

impl ProcessorConfig {
    pub fn new(
        mode: ProcessMode,
        media_root: impl Into<PathBuf>,
        duplicates_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mode,
            media_root: media_root.into(),
            duplicates_root: duplicates_root.into(),
            skip_files: HashSet::new(),
        }
    }

    pub fn skip_files<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_files = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Processes single files against the shared index
pub struct FileProcessor {
    config: ProcessorConfig,
    index: Arc<dyn KeyValueIndex>,
    hasher: ContentHasher,
    resolver: Arc<MetadataResolver>,
    planner: DestinationPlanner,
    converter: Option<Arc<dyn ImageConverter>>,
    guard: DigestGuard,
}

impl FileProcessor {
    /// Roots that already exist are canonicalized, so recorded paths agree
    /// with the canonical paths the walker produces.
    pub fn new(mut config: ProcessorConfig, index: Arc<dyn KeyValueIndex>) -> Self {
        config.media_root = canonical_or_given(&config.media_root);
        config.duplicates_root = canonical_or_given(&config.duplicates_root);

        let planner = DestinationPlanner::new(config.media_root.clone());
        Self {
            config,
            index,
            hasher: ContentHasher::new(),
            resolver: Arc::new(MetadataResolver::with_default_sources()),
            planner,
            converter: None,
            guard: DigestGuard::new(),
        }
    }

    pub fn resolver(mut self, resolver: Arc<MetadataResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn ImageConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn hasher(mut self, hasher: ContentHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn mode(&self) -> ProcessMode {
        self.config.mode
    }

    pub fn index(&self) -> &Arc<dyn KeyValueIndex> {
        &self.index
    }

    /// Process one file.
    ///
    /// Returns `Err` only when the index fails.
    pub fn process(&self, path: &Path) -> Result<FileOutcome, IndexError> {
        if self.is_skipped(path) {
            debug!("Skipping {}", path.display());
            return Ok(FileOutcome::Skipped);
        }

        debug!("Processing file {}", path.display());

        let result = match self.config.mode {
            ProcessMode::Scan { move_duplicates } => self.scan(path, move_duplicates),
            ProcessMode::Import => self.import(path),
        };

        match result {
            Ok(outcome) => {
                debug!("{}: {}", path.display(), outcome);
                Ok(outcome)
            }
            Err(MediaManagerError::Index(e)) => {
                error!("Index failure while processing {}: {}", path.display(), e);
                Err(e)
            }
            Err(e) => {
                error!("Error processing {}: {}", path.display(), e);
                Ok(FileOutcome::Failed {
                    reason: e.to_string(),
                })
            }
        }
    }

    fn is_skipped(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| self.config.skip_files.contains(n))
            .unwrap_or(false)
    }

    fn scan(&self, path: &Path, move_duplicates: bool) -> Result<FileOutcome, MediaManagerError> {
        let digest = self.hasher.hash_file(path)?;
        let key = IndexKey::Content(digest);
        let value = path_value(path);

        loop {
            let current = self.index.get(&key)?;

            let outcome = match current.as_deref() {
                None => {
                    debug!("Adding record for {} ({})", path.display(), digest);
                    FileOutcome::Recorded
                }
                Some(canonical) if Path::new(canonical) == path => {
                    return Ok(FileOutcome::AlreadyCanonical);
                }
                Some(canonical) if !Path::new(canonical).is_file() => {
                    debug!("Replacing record for {} ({})", canonical, digest);
                    FileOutcome::Replaced {
                        stale: PathBuf::from(canonical),
                    }
                }
                Some(canonical) => {
                    return self.handle_duplicate(path, PathBuf::from(canonical), move_duplicates);
                }
            };

            if self
                .index
                .compare_and_swap(&key, current.as_deref(), &value)?
            {
                return Ok(outcome);
            }

            debug!("Record for {} changed concurrently, re-deciding", digest);
        }
    }

    fn handle_duplicate(
        &self,
        path: &Path,
        original: PathBuf,
        move_duplicates: bool,
    ) -> Result<FileOutcome, MediaManagerError> {
        info!(
            "Duplicate detected for {} (original is {})",
            path.display(),
            original.display()
        );

        if !move_duplicates {
            return Ok(FileOutcome::Duplicate {
                original,
                relocated_to: None,
            });
        }

        let target = mirrored_path(path, &self.config.media_root, &self.config.duplicates_root);
        let reserved = reserve_unique_path(&target)?;
        move_into(path, &reserved)?;
        info!("Moved {} to {}", path.display(), reserved.display());

        Ok(FileOutcome::Duplicate {
            original,
            relocated_to: Some(reserved),
        })
    }

    fn import(&self, path: &Path) -> Result<FileOutcome, MediaManagerError> {
        match &self.converter {
            Some(converter) if is_heic(path) => self.import_heic(path, converter.as_ref()),
            _ => self.import_content(path, path, None),
        }
    }

    /// Convert, then import the converted file. Converted output is never
    /// converted again.
    fn import_heic(
        &self,
        path: &Path,
        converter: &dyn ImageConverter,
    ) -> Result<FileOutcome, MediaManagerError> {
        let heic_digest = self.hasher.hash_file(path)?;
        let _lock = self.guard.lock(heic_digest);

        if let Some(canonical) = self.live_canonical(&IndexKey::Content(heic_digest))? {
            debug!("{} was imported before, not converting", path.display());
            return Ok(FileOutcome::AlreadyImported { canonical });
        }

        info!("Converting {} to JPEG", path.display());
        let converted = match converter.convert(path) {
            Ok(converted) => converted,
            Err(e) => {
                warn!("Leaving {} as is: {}", path.display(), e);
                return Ok(FileOutcome::Inert {
                    reason: e.to_string(),
                });
            }
        };

        self.import_content(converted.path(), path, Some(heic_digest))
    }

    /// Copy `content` into the archive unless its digest is already there.
    ///
    /// Metadata is read from `origin`. `source_digest` is the digest of the
    /// pre-conversion file, which is recorded against the same destination.
    fn import_content(
        &self,
        content: &Path,
        origin: &Path,
        source_digest: Option<ContentDigest>,
    ) -> Result<FileOutcome, MediaManagerError> {
        debug!("Analyzing file {}", content.display());
        let digest = self.hasher.hash_file(content)?;
        let key = IndexKey::Content(digest);

        // The caller may already hold this digest
        let _lock = (source_digest != Some(digest)).then(|| self.guard.lock(digest));

        if let Some(canonical) = self.live_canonical(&key)? {
            info!(
                "File has already been imported {} ({}) {}",
                origin.display(),
                digest,
                canonical.display()
            );
            if let Some(source_digest) = source_digest {
                self.index
                    .put(&IndexKey::Content(source_digest), &path_value(&canonical))?;
            }
            return Ok(FileOutcome::AlreadyImported { canonical });
        }

        info!("Importing file {} ({})", origin.display(), digest);
        let record = self.resolver.resolve(origin);
        let destination = self.planner.plan_and_reserve(&record, content)?;

        info!("Copying {} to {}", origin.display(), destination.display());
        copy_into(content, &destination)?;

        let value = path_value(&destination);
        self.index.put(&key, &value)?;
        if let Some(source_digest) = source_digest {
            self.index.put(&IndexKey::Content(source_digest), &value)?;
        }

        Ok(FileOutcome::Imported { destination })
    }

    /// Canonical path for a key, if recorded and still on disk
    fn live_canonical(&self, key: &IndexKey) -> Result<Option<PathBuf>, IndexError> {
        Ok(self
            .index
            .get(key)?
            .map(PathBuf::from)
            .filter(|p| p.is_file()))
    }
}

fn canonical_or_given(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::convert::ConvertedImage;
    use crate::core::index::InMemoryIndex;
    use crate::core::metadata::{MetadataSource, SourceMetadata};
    use crate::error::ConvertError;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FixedDate;

    impl MetadataSource for FixedDate {
        fn extract(&self, _path: &Path) -> SourceMetadata {
            SourceMetadata {
                timestamp: NaiveDate::from_ymd_opt(2021, 6, 1)
                    .and_then(|d| d.and_hms_opt(12, 0, 0)),
                ..SourceMetadata::default()
            }
        }
    }

    /// Prefixes the input so the output digest differs; counts calls
    struct FakeConverter {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeConverter {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl ImageConverter for FakeConverter {
        fn convert(&self, path: &Path) -> Result<ConvertedImage, ConvertError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ConvertError::Failed {
                    path: path.to_path_buf(),
                    reason: "unsupported".into(),
                });
            }
            let dir = TempDir::new().map_err(ConvertError::TempDir)?;
            let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
            let out = dir.path().join(format!("{}.jpg", stem));
            let mut bytes = b"jpeg:".to_vec();
            bytes.extend(fs::read(path).map_err(ConvertError::TempDir)?);
            fs::write(&out, bytes).map_err(ConvertError::TempDir)?;
            Ok(ConvertedImage::new(out, dir))
        }
    }

    struct Fixture {
        _temp: TempDir,
        media: PathBuf,
        dupes: PathBuf,
        source: PathBuf,
        index: Arc<InMemoryIndex>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let root = fs::canonicalize(temp.path()).unwrap();
            let media = root.join("media");
            let dupes = root.join("dupes");
            let source = root.join("incoming");
            fs::create_dir_all(&media).unwrap();
            fs::create_dir_all(&source).unwrap();
            Self {
                _temp: temp,
                media,
                dupes,
                source,
                index: Arc::new(InMemoryIndex::new()),
            }
        }

        fn processor(&self, mode: ProcessMode) -> FileProcessor {
            let config = ProcessorConfig::new(mode, &self.media, &self.dupes)
                .skip_files([".DS_Store"]);
            FileProcessor::new(config, self.index.clone())
                .resolver(Arc::new(MetadataResolver::new().source(Box::new(FixedDate))))
        }

        fn write(&self, dir: &Path, name: &str, content: &[u8]) -> PathBuf {
            let path = dir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn canonical(&self, path: &Path) -> Option<String> {
            let digest = ContentHasher::new().hash_file(path).unwrap();
            self.index.get(&IndexKey::Content(digest)).unwrap()
        }
    }

    const SCAN: ProcessMode = ProcessMode::Scan {
        move_duplicates: false,
    };

    #[test]
    fn skip_list_files_are_untouched() {
        let fx = Fixture::new();
        let path = fx.write(&fx.media, ".DS_Store", b"junk");

        let outcome = fx.processor(SCAN).process(&path).unwrap();

        assert_eq!(outcome, FileOutcome::Skipped);
        assert_eq!(fx.index.stats().unwrap().content_entries, 0);
    }

    #[test]
    fn scan_records_then_recognizes_canonical() {
        let fx = Fixture::new();
        let path = fx.write(&fx.media, "a.jpg", b"photo");
        let processor = fx.processor(SCAN);

        assert_eq!(processor.process(&path).unwrap(), FileOutcome::Recorded);
        assert_eq!(processor.process(&path).unwrap(), FileOutcome::AlreadyCanonical);
        assert_eq!(fx.canonical(&path), Some(path_value(&path)));
    }

    #[test]
    fn scan_reports_duplicate_without_moving() {
        let fx = Fixture::new();
        let a = fx.write(&fx.media, "a.jpg", b"photo");
        let b = fx.write(&fx.media, "b.jpg", b"photo");
        let processor = fx.processor(SCAN);

        processor.process(&a).unwrap();
        let outcome = processor.process(&b).unwrap();

        assert_eq!(
            outcome,
            FileOutcome::Duplicate {
                original: a.clone(),
                relocated_to: None
            }
        );
        assert!(b.exists());
        assert_eq!(fx.canonical(&a), Some(path_value(&a)));
    }

    #[test]
    fn scan_moves_duplicate_into_mirrored_tree() {
        let fx = Fixture::new();
        let a = fx.write(&fx.media, "2021/a.jpg", b"photo");
        let b = fx.write(&fx.media, "trip/b.jpg", b"photo");
        let processor = fx.processor(ProcessMode::Scan {
            move_duplicates: true,
        });

        processor.process(&a).unwrap();
        let outcome = processor.process(&b).unwrap();

        let expected = fx.dupes.join("trip").join("b.jpg");
        assert_eq!(
            outcome,
            FileOutcome::Duplicate {
                original: a.clone(),
                relocated_to: Some(expected.clone())
            }
        );
        assert!(!b.exists());
        assert_eq!(fs::read(&expected).unwrap(), b"photo");
    }

    #[test]
    fn scan_replaces_missing_canonical() {
        let fx = Fixture::new();
        let a = fx.write(&fx.media, "a.jpg", b"photo");
        let processor = fx.processor(SCAN);
        processor.process(&a).unwrap();
        fs::remove_file(&a).unwrap();

        let b = fx.write(&fx.media, "b.jpg", b"photo");
        let outcome = processor.process(&b).unwrap();

        assert_eq!(outcome, FileOutcome::Replaced { stale: a });
        assert_eq!(fx.canonical(&b), Some(path_value(&b)));
    }

    #[test]
    fn unreadable_file_fails_without_index_change() {
        let fx = Fixture::new();
        let outcome = fx
            .processor(SCAN)
            .process(&fx.media.join("missing.jpg"))
            .unwrap();

        assert!(!outcome.is_success());
        assert_eq!(fx.index.stats().unwrap().content_entries, 0);
    }

    #[test]
    fn import_copies_into_dated_folder() {
        let fx = Fixture::new();
        let src = fx.write(&fx.source, "IMG_1.jpg", b"photo");
        let processor = fx.processor(ProcessMode::Import);

        let outcome = processor.process(&src).unwrap();

        let expected = fx.media.join("2021").join("2021-06-01").join("IMG_1.jpg");
        assert_eq!(
            outcome,
            FileOutcome::Imported {
                destination: expected.clone()
            }
        );
        assert!(src.exists());
        assert_eq!(fs::read(&expected).unwrap(), b"photo");
        assert_eq!(fx.canonical(&src), Some(path_value(&expected)));
    }

    #[test]
    fn import_is_idempotent() {
        let fx = Fixture::new();
        let src = fx.write(&fx.source, "IMG_1.jpg", b"photo");
        let processor = fx.processor(ProcessMode::Import);

        processor.process(&src).unwrap();
        let second = processor.process(&src).unwrap();

        assert!(matches!(second, FileOutcome::AlreadyImported { .. }));
        let folder = fx.media.join("2021").join("2021-06-01");
        assert_eq!(fs::read_dir(folder).unwrap().count(), 1);
    }

    #[test]
    fn identical_files_are_copied_once_in_parallel() {
        let fx = Fixture::new();
        let paths: Vec<PathBuf> = (0..6)
            .map(|i| fx.write(&fx.source, &format!("copy_{}.jpg", i), b"same"))
            .collect();
        let processor = fx.processor(ProcessMode::Import);
        let processor = &processor;

        let outcomes: Vec<FileOutcome> = std::thread::scope(|s| {
            let handles: Vec<_> = paths
                .iter()
                .map(|p| s.spawn(move || processor.process(p).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let imported = outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Imported { .. }))
            .count();
        assert_eq!(imported, 1);
    }

    #[test]
    fn heic_is_converted_and_both_digests_recorded() {
        let fx = Fixture::new();
        let heic = fx.write(&fx.source, "IMG_2.HEIC", b"heic-bytes");
        let converter = Arc::new(FakeConverter::new(false));
        let processor = fx.processor(ProcessMode::Import).converter(converter.clone());

        let outcome = processor.process(&heic).unwrap();

        let expected = fx.media.join("2021").join("2021-06-01").join("IMG_2.jpg");
        assert_eq!(
            outcome,
            FileOutcome::Imported {
                destination: expected.clone()
            }
        );
        assert_eq!(fx.canonical(&heic), Some(path_value(&expected)));

        let again = processor.process(&heic).unwrap();
        assert!(matches!(again, FileOutcome::AlreadyImported { .. }));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_conversion_is_inert() {
        let fx = Fixture::new();
        let heic = fx.write(&fx.source, "IMG_3.heic", b"heic-bytes");
        let processor = fx
            .processor(ProcessMode::Import)
            .converter(Arc::new(FakeConverter::new(true)));

        let outcome = processor.process(&heic).unwrap();

        assert!(matches!(outcome, FileOutcome::Inert { .. }));
        assert!(outcome.is_success());
        assert_eq!(fx.index.stats().unwrap().content_entries, 0);
    }

    /// Deletes the file it is asked about, after hashing has already happened
    struct VanishingSource;

    impl MetadataSource for VanishingSource {
        fn extract(&self, path: &Path) -> SourceMetadata {
            let _ = fs::remove_file(path);
            FixedDate.extract(path)
        }
    }

    #[test]
    fn concurrent_scan_of_identical_files_keeps_one_canonical() {
        const WORKERS: usize = 8;

        let fx = Fixture::new();
        let paths: Vec<PathBuf> = (0..WORKERS)
            .map(|i| fx.write(&fx.media, &format!("burst/copy_{}.jpg", i), b"same"))
            .collect();
        let processor = fx.processor(ProcessMode::Scan {
            move_duplicates: true,
        });
        let processor = &processor;

        let outcomes: Vec<FileOutcome> = std::thread::scope(|s| {
            let handles: Vec<_> = paths
                .iter()
                .map(|p| s.spawn(move || processor.process(p).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let recorded = outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Recorded))
            .count();
        let relocated = outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o,
                    FileOutcome::Duplicate {
                        relocated_to: Some(_),
                        ..
                    }
                )
            })
            .count();
        assert_eq!(recorded, 1);
        assert_eq!(relocated, WORKERS - 1);

        let survivors: Vec<&PathBuf> = paths.iter().filter(|p| p.exists()).collect();
        assert_eq!(survivors.len(), 1);
        assert_eq!(fx.canonical(survivors[0]), Some(path_value(survivors[0])));
        assert_eq!(
            fs::read_dir(fx.dupes.join("burst")).unwrap().count(),
            WORKERS - 1
        );
    }

    #[test]
    fn failed_copy_reports_failure_and_records_nothing() {
        let fx = Fixture::new();
        let src = fx.write(&fx.source, "IMG_4.jpg", b"photo");
        let config = ProcessorConfig::new(ProcessMode::Import, &fx.media, &fx.dupes);
        let processor = FileProcessor::new(config, fx.index.clone())
            .resolver(Arc::new(MetadataResolver::new().source(Box::new(VanishingSource))));

        let outcome = processor.process(&src).unwrap();

        assert!(matches!(outcome, FileOutcome::Failed { .. }));
        assert_eq!(fx.index.stats().unwrap().content_entries, 0);
        let folder = fx.media.join("2021").join("2021-06-01");
        assert_eq!(fs::read_dir(folder).unwrap().count(), 0);
    }
}
