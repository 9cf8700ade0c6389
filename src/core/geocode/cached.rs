//! Geocoder wrapper that caches lookups in the index.

use super::{Address, GeocodeService, GEO_CELL_PRECISION};
use crate::core::index::{IndexKey, KeyValueIndex};
use crate::core::metadata::Coordinates;
use crate::error::GeocodeError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache key for a coordinate pair, rounded to the geo-cell precision
pub fn geo_cell_key(coords: Coordinates) -> IndexKey {
    let rounded = coords.rounded(GEO_CELL_PRECISION);
    IndexKey::GeoCell(format!("{:.6},{:.6}", rounded.latitude, rounded.longitude))
}

/// Serves repeat lookups from the `geo` namespace of the index
///
/// Only non-empty results are cached, so failed lookups are retried on a
/// later run.
pub struct CachedGeocoder {
    inner: Arc<dyn GeocodeService>,
    index: Arc<dyn KeyValueIndex>,
}

impl CachedGeocoder {
    pub fn new(inner: Arc<dyn GeocodeService>, index: Arc<dyn KeyValueIndex>) -> Self {
        Self { inner, index }
    }

    fn cached(&self, key: &IndexKey) -> Option<Address> {
        match self.index.get(key) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(address) => Some(address),
                Err(e) => {
                    warn!("Ignoring unreadable cached address for {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Geocode cache lookup failed for {}: {}", key, e);
                None
            }
        }
    }
}

impl GeocodeService for CachedGeocoder {
    fn reverse_geocode(&self, coords: Coordinates) -> Result<Address, GeocodeError> {
        let key = geo_cell_key(coords);

        if let Some(address) = self.cached(&key) {
            debug!("Geocode cache hit for {}", key);
            return Ok(address);
        }

        let address = self
            .inner
            .reverse_geocode(coords.rounded(GEO_CELL_PRECISION))?;

        if !address.is_empty() {
            match serde_json::to_string(&address) {
                Ok(json) => {
                    if let Err(e) = self.index.put(&key, &json) {
                        warn!("Failed to cache address for {}: {}", key, e);
                    }
                }
                Err(e) => warn!("Failed to serialize address for {}: {}", key, e),
            }
        }

        Ok(address)
    }
}
