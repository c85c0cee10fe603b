// Common types used across the kernel and domain layers
//
// Kept here so kernel traits can name them without depending on a domain module.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
///
/// Serialized as `{"latitude": .., "longitude": ..}`, the same shape partner
/// apps write into `currentLocation` and requesters into `originLocation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another point in kilometers
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        super::utils::calculate_distance_km(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    /// JSON string form used inside flat notification payloads
    pub fn to_json_string(&self) -> String {
        serde_json::json!({
            "latitude": self.latitude,
            "longitude": self.longitude,
        })
        .to_string()
    }
}
