use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

use crate::common::GeoPoint;
use crate::kernel::BaseGeocoder;

/// Public Nominatim endpoint (OpenStreetMap)
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Address written onto a request when reverse geocoding fails
pub const FALLBACK_ADDRESS: &str = "Address unavailable";

/// Nominatim reverse geocoding response
#[derive(Debug, Deserialize)]
struct NominatimReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

/// Reverse geocoder backed by Nominatim
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self::new(DEFAULT_NOMINATIM_URL)
    }
}

#[async_trait]
impl BaseGeocoder for NominatimGeocoder {
    /// Resolve coordinates to a human-readable address
    #[instrument(skip(self), fields(lat = %point.latitude, lng = %point.longitude))]
    async fn reverse(&self, point: GeoPoint) -> Result<String> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json",
            self.base_url, point.latitude, point.longitude
        );

        debug!("Reverse geocoding origin");

        let response: NominatimReverseResponse = self
            .client
            .get(&url)
            .header("User-Agent", "RoadsideDispatch/1.0 (Dispatch Engine)")
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Reverse geocoding request failed");
                anyhow!("Reverse geocoding request failed: {}", e)
            })?
            .json()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to parse reverse geocoding response");
                anyhow!("Failed to parse reverse geocoding response: {}", e)
            })?;

        if let Some(err) = response.error {
            warn!(error = %err, "Location not resolvable by geocoding API");
            return Err(anyhow!("Location not resolvable: {}", err));
        }

        response
            .display_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| anyhow!("Geocoding response had no display name"))
    }
}

/// Calculate distance between two coordinates in kilometers
///
/// Uses the Haversine formula with a mean Earth radius of 6371 km.
pub fn calculate_distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
