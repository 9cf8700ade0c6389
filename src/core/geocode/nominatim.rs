//! OpenStreetMap Nominatim reverse geocoder.

use super::{Address, GeocodeService, RateLimiter};
use crate::core::metadata::Coordinates;
use crate::error::GeocodeError;
use reqwest::blocking::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Public Nominatim endpoint
pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Nominatim's usage policy requires an identifying user agent
pub const DEFAULT_USER_AGENT: &str = "MediaManager";

/// Reverse geocoder backed by a Nominatim server
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl NominatimGeocoder {
    /// Create a geocoder that waits at least `interval` between requests
    pub fn new(user_agent: &str, interval: Duration) -> Result<Self, GeocodeError> {
        Self::with_base_url(NOMINATIM_URL, user_agent, interval)
    }

    pub fn with_base_url(
        base_url: &str,
        user_agent: &str,
        interval: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(interval),
        })
    }
}

impl GeocodeService for NominatimGeocoder {
    fn reverse_geocode(&self, coords: Coordinates) -> Result<Address, GeocodeError> {
        let waited = self.limiter.acquire();
        if !waited.is_zero() {
            debug!("Waited {:?} for the geocoding rate limit", waited);
        }

        info!(
            "Getting location for ({}, {})",
            coords.latitude, coords.longitude
        );

        let body: Value = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", coords.latitude.to_string()),
                ("lon", coords.longitude.to_string()),
            ])
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| GeocodeError::Request(e.to_string()))?
            .json()
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

        parse_address(&body)
    }
}

/// Pull the `address` object out of a reverse-geocoding response
fn parse_address(body: &Value) -> Result<Address, GeocodeError> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Err(GeocodeError::InvalidResponse(error.to_string()));
    }

    let fields = body
        .get("address")
        .and_then(Value::as_object)
        .ok_or_else(|| GeocodeError::InvalidResponse("missing address".to_string()))?;

    let fields: BTreeMap<String, String> = fields
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect();

    Ok(Address::new(fields))
}
