//! MP4/QuickTime container metadata source.
//!
//! Reads the movie header (`moov/mvhd`) creation time. Nothing else in the
//! container is parsed.

use super::{MetadataSource, SourceMetadata};
use chrono::{DateTime, NaiveDateTime};
use mp4::Mp4Reader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Seconds between 1904-01-01 (QuickTime epoch) and 1970-01-01
const QUICKTIME_EPOCH_OFFSET: u64 = 2_082_844_800;

const CONTAINER_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "3gp", "qt"];

/// Extracts the recording time from MP4-family video files
#[derive(Debug, Clone, Default)]
pub struct ContainerMetadataSource;

impl ContainerMetadataSource {
    pub fn new() -> Self {
        Self
    }

    /// Check if the file extension is an MP4-family container
    pub fn is_container_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| CONTAINER_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl MetadataSource for ContainerMetadataSource {
    fn extract(&self, path: &Path) -> SourceMetadata {
        let mut metadata = SourceMetadata::default();

        if !Self::is_container_file(path) {
            return metadata;
        }

        if let Some(seconds) = read_mvhd_creation_time(path) {
            metadata.timestamp = quicktime_to_datetime(seconds);
            metadata
                .tags
                .insert("mvhd.creation_time".to_string(), seconds.to_string());
        }

        metadata
    }
}

/// Creation time from `moov/mvhd`, in seconds since the QuickTime epoch
fn read_mvhd_creation_time(path: &Path) -> Option<u64> {
    let file = File::open(path).ok()?;
    let size = file.metadata().ok()?.len();

    match Mp4Reader::read_header(BufReader::new(file), size) {
        Ok(mp4) => Some(mp4.moov.mvhd.creation_time),
        Err(e) => {
            debug!("No movie header in {}: {}", path.display(), e);
            None
        }
    }
}

/// Container times are UTC; zero means "not set"
fn quicktime_to_datetime(seconds: u64) -> Option<NaiveDateTime> {
    if seconds == 0 {
        return None;
    }
    let unix = seconds.checked_sub(QUICKTIME_EPOCH_OFFSET)?;
    DateTime::from_timestamp(i64::try_from(unix).ok()?, 0).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn mp4_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    /// Version 0 `mvhd` payload with every field a reader expects
    fn mvhd_v0(creation_time: u32) -> Vec<u8> {
        let mut body = vec![0u8; 4];
        body.extend_from_slice(&creation_time.to_be_bytes());
        body.extend_from_slice(&creation_time.to_be_bytes()); // modification time
        body.extend_from_slice(&1000u32.to_be_bytes()); // timescale
        body.extend_from_slice(&0u32.to_be_bytes()); // duration
        body.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
        body.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
        body.extend_from_slice(&[0u8; 10]);
        for value in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
            body.extend_from_slice(&value.to_be_bytes());
        }
        body.extend_from_slice(&[0u8; 24]);
        body.extend_from_slice(&2u32.to_be_bytes()); // next track id
        body
    }

    fn minimal_mp4(creation_time: u32) -> Vec<u8> {
        let mut file = mp4_box(b"ftyp", b"isom\0\0\x02\0isommp41");
        file.extend(mp4_box(b"free", &[0u8; 16]));
        file.extend(mp4_box(b"moov", &mp4_box(b"mvhd", &mvhd_v0(creation_time))));
        file
    }

    fn write_clip(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    // 2021-06-01T12:00:00Z
    const JUNE_FIRST_QT: u32 = (1_622_548_800u64 + QUICKTIME_EPOCH_OFFSET) as u32;

    #[test]
    fn reads_mvhd_creation_time() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_clip(&temp_dir, "clip.mp4", &minimal_mp4(JUNE_FIRST_QT));

        assert_eq!(read_mvhd_creation_time(&path), Some(JUNE_FIRST_QT as u64));
    }

    #[test]
    fn converts_quicktime_epoch() {
        let expected = NaiveDate::from_ymd_opt(2021, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(quicktime_to_datetime(JUNE_FIRST_QT as u64), Some(expected));
        assert_eq!(quicktime_to_datetime(0), None);
    }

    #[test]
    fn missing_moov_yields_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_clip(&temp_dir, "clip.mp4", &mp4_box(b"ftyp", b"isom\0\0\x02\0"));

        assert_eq!(read_mvhd_creation_time(&path), None);
        assert!(ContainerMetadataSource::new().extract(&path).is_empty());
    }

    #[test]
    fn unset_creation_time_is_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_clip(&temp_dir, "clip.mov", &minimal_mp4(0));

        assert_eq!(ContainerMetadataSource::new().extract(&path).timestamp, None);
    }

    #[test]
    fn extracts_from_mov_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_clip(&temp_dir, "clip.MOV", &minimal_mp4(JUNE_FIRST_QT));

        let metadata = ContainerMetadataSource::new().extract(&path);

        assert_eq!(
            metadata.timestamp.map(|t| t.date()),
            NaiveDate::from_ymd_opt(2021, 6, 1)
        );
    }

    #[test]
    fn ignores_non_container_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_clip(&temp_dir, "clip.jpg", &minimal_mp4(JUNE_FIRST_QT));

        assert!(ContainerMetadataSource::new().extract(&path).is_empty());
    }
}
