//! # Metadata Module
//!
//! Works out when and where a photo or video was captured.
//!
//! ## Sources, in order of preference
//! 1. EXIF tags (`DateTimeOriginal`, GPS position)
//! 2. Container metadata (MP4/QuickTime `mvhd` creation time)
//! 3. Filesystem timestamps (earlier of created/modified)
//!
//! Coordinates, when present, are turned into a place name through a
//! [`GeocodeService`](crate::core::geocode::GeocodeService). Any failure along
//! the way just leaves the corresponding field empty.

mod container;
mod exif_tags;

pub use self::container::ContainerMetadataSource;
pub use self::exif_tags::ExifMetadataSource;

use crate::core::geocode::{GeocodeService, PlaceNamer};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Round both components to `precision` decimal places
    pub fn rounded(&self, precision: i32) -> Self {
        let factor = 10f64.powi(precision);
        Self {
            latitude: (self.latitude * factor).round() / factor,
            longitude: (self.longitude * factor).round() / factor,
        }
    }
}

/// What a single metadata source could extract from a file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMetadata {
    /// Raw tag values, by tag name
    pub tags: BTreeMap<String, String>,
    /// Capture time, as recorded by the device
    pub timestamp: Option<NaiveDateTime>,
    /// Capture position
    pub coordinates: Option<Coordinates>,
}

impl SourceMetadata {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.timestamp.is_none() && self.coordinates.is_none()
    }
}

/// Trait for metadata extractors
///
/// Extraction never fails: unreadable or unsupported files yield
/// `SourceMetadata::default()`.
pub trait MetadataSource: Send + Sync {
    fn extract(&self, path: &Path) -> SourceMetadata;
}

/// Normalized capture metadata for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub capture_timestamp: Option<NaiveDateTime>,
    /// `YYYY-MM-DD`, absent when no timestamp could be found
    pub capture_date: Option<String>,
    /// `YYYY`, absent when no timestamp could be found
    pub capture_year: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub place_name: Option<String>,
}

impl MetadataRecord {
    pub fn new(
        capture_timestamp: Option<NaiveDateTime>,
        coordinates: Option<Coordinates>,
        place_name: Option<String>,
    ) -> Self {
        Self {
            capture_timestamp,
            capture_date: capture_timestamp.map(|t| t.format("%Y-%m-%d").to_string()),
            capture_year: capture_timestamp.map(|t| t.format("%Y").to_string()),
            coordinates,
            place_name,
        }
    }
}

/// Combines metadata sources, filesystem times and geocoding
pub struct MetadataResolver {
    sources: Vec<Box<dyn MetadataSource>>,
    geocoder: Option<Arc<dyn GeocodeService>>,
    place_namer: PlaceNamer,
}

impl MetadataResolver {
    /// Resolver with no sources and no geocoder; only filesystem times
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            geocoder: None,
            place_namer: PlaceNamer::default(),
        }
    }

    /// EXIF then container metadata, the usual setup
    pub fn with_default_sources() -> Self {
        Self::new()
            .source(Box::new(ExifMetadataSource::new()))
            .source(Box::new(ContainerMetadataSource::new()))
    }

    /// Append a source; earlier sources win
    pub fn source(mut self, source: Box<dyn MetadataSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn geocoder(mut self, geocoder: Arc<dyn GeocodeService>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn place_namer(mut self, place_namer: PlaceNamer) -> Self {
        self.place_namer = place_namer;
        self
    }

    /// Build the metadata record for a file
    pub fn resolve(&self, path: &Path) -> MetadataRecord {
        let mut timestamp = None;
        let mut coordinates = None;

        for source in &self.sources {
            let extracted = source.extract(path);
            if timestamp.is_none() {
                timestamp = extracted.timestamp;
            }
            if coordinates.is_none() {
                coordinates = extracted.coordinates;
            }
            if timestamp.is_some() && coordinates.is_some() {
                break;
            }
        }

        if timestamp.is_none() {
            timestamp = filesystem_timestamp(path);
            debug!("Using filesystem time for {}", path.display());
        }

        let place_name = coordinates.and_then(|coords| self.place_name_for(path, coords));

        MetadataRecord::new(timestamp, coordinates, place_name)
    }

    fn place_name_for(&self, path: &Path, coords: Coordinates) -> Option<String> {
        let geocoder = self.geocoder.as_ref()?;

        match geocoder.reverse_geocode(coords) {
            Ok(address) => self.place_namer.place_name(&address),
            Err(e) => {
                warn!("No location for {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::with_default_sources()
    }
}

/// Earlier of the file's creation and modification times, in local time
pub fn filesystem_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            warn!("Cannot read file times for {}: {}", path.display(), e);
            return None;
        }
    };

    let earliest = [metadata.created().ok(), metadata.modified().ok()]
        .into_iter()
        .flatten()
        .min()?;

    let local: DateTime<Local> = earliest.into();
    Some(local.naive_local())
}
