//! # Geocode Module
//!
//! Turns GPS coordinates into a human-readable place name.
//!
//! ## Pieces
//! - `GeocodeService` - reverse lookup of coordinates to address fields
//! - `NominatimGeocoder` - OpenStreetMap implementation, rate limited
//! - `CachedGeocoder` - caches lookups in the index, keyed by geo cell
//! - `PlaceNamer` - formats address fields into a folder-friendly name
//!
//! Lookups are best effort. Callers treat any error as "no location".

mod cached;
mod limiter;
mod nominatim;

pub use cached::{geo_cell_key, CachedGeocoder};
pub use limiter::RateLimiter;
pub use nominatim::{NominatimGeocoder, DEFAULT_USER_AGENT, NOMINATIM_URL};

use crate::core::metadata::Coordinates;
use crate::error::GeocodeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decimal places kept when keying the geocode cache
pub const GEO_CELL_PRECISION: i32 = 6;

/// Trait for reverse geocoders
pub trait GeocodeService: Send + Sync {
    fn reverse_geocode(&self, coords: Coordinates) -> Result<Address, GeocodeError>;
}

/// Address fields as returned by the geocoder (e.g. `road`, `city`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address {
    fields: BTreeMap<String, String>,
}

impl Address {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Formats addresses into place names
///
/// Names look like `"Main Street, Denver, CO"` or `"Denver, CO"`. A
/// `locations` map lets users replace a specific address with a name of
/// their own, keyed by `"{house_number} {road}, {city}, {state}"`.
#[derive(Debug, Clone, Default)]
pub struct PlaceNamer {
    locations: BTreeMap<String, String>,
}

impl PlaceNamer {
    pub fn new(locations: BTreeMap<String, String>) -> Self {
        Self { locations }
    }

    pub fn place_name(&self, address: &Address) -> Option<String> {
        let house_number = address.get("house_number").unwrap_or_default();
        let road = address.get("road").unwrap_or_default();
        let city = address
            .get("city")
            .or_else(|| address.get("town"))
            .or_else(|| address.get("county"))
            .unwrap_or_default();
        let state = address.get("ISO3166-2-lvl4").unwrap_or_default();
        let state = state.strip_prefix("US-").unwrap_or(state);

        let lookup = format!("{} {}, {}, {}", house_number, road, city, state);
        if let Some(name) = self.locations.get(&lookup) {
            return Some(sanitize_folder_name(name));
        }

        let parts: Vec<&str> = [road, city, state]
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            return None;
        }

        Some(sanitize_folder_name(&parts.join(", ")))
    }
}

/// Replace characters that would split or break a folder name
fn sanitize_folder_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '-',
            c => c,
        })
        .collect()
}
