//! EXIF metadata source.

use super::{Coordinates, MetadataSource, SourceMetadata};
use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Reads capture time, GPS position and a few descriptive tags from EXIF
#[derive(Debug, Clone, Default)]
pub struct ExifMetadataSource;

impl ExifMetadataSource {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataSource for ExifMetadataSource {
    fn extract(&self, path: &Path) -> SourceMetadata {
        let mut metadata = SourceMetadata::default();

        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return metadata,
        };

        let mut bufreader = BufReader::new(&file);
        let exif_reader = match Reader::new().read_from_container(&mut bufreader) {
            Ok(r) => r,
            Err(_) => return metadata,
        };

        // DateTimeOriginal is when the shutter fired; DateTime is when the
        // file was last written, which is the best we have otherwise.
        metadata.timestamp = [Tag::DateTimeOriginal, Tag::DateTime]
            .into_iter()
            .filter_map(|tag| exif_reader.get_field(tag, In::PRIMARY))
            .filter_map(|field| get_string_value(&field.value))
            .find_map(|s| parse_exif_datetime(&s));

        metadata.coordinates = extract_coordinates(&exif_reader);

        for tag in [Tag::Make, Tag::Model, Tag::DateTimeOriginal] {
            if let Some(field) = exif_reader.get_field(tag, In::PRIMARY) {
                if let Some(value) = get_string_value(&field.value) {
                    metadata.tags.insert(tag.to_string(), value);
                }
            }
        }

        metadata
    }
}

/// Parse an EXIF date ("YYYY:MM:DD HH:MM:SS")
fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y:%m:%d %H:%M:%S").ok()
}

fn extract_coordinates(exif: &Exif) -> Option<Coordinates> {
    let latitude = gps_component(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S")?;
    let longitude = gps_component(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W")?;
    Some(Coordinates::new(latitude, longitude))
}

/// Degrees/minutes/seconds to signed decimal degrees
fn gps_component(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative_ref: &str) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let parts = match field.value {
        Value::Rational(ref vec) if vec.len() >= 3 => vec,
        _ => return None,
    };

    let degrees = dms_to_degrees(parts[0].to_f64(), parts[1].to_f64(), parts[2].to_f64());
    if !degrees.is_finite() {
        return None;
    }

    let reference = exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(|f| get_string_value(&f.value));

    match reference {
        Some(r) if r.eq_ignore_ascii_case(negative_ref) => Some(-degrees),
        _ => Some(degrees),
    }
}

fn dms_to_degrees(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

/// Helper to extract string from EXIF ASCII value
fn get_string_value(value: &Value) -> Option<String> {
    if let Value::Ascii(ref vec) = value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                let trimmed = s.trim_end_matches('\0').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}
