//! Test fixtures for creating requests and partners.
//!
//! Locations are placed due north of the origin so distances are easy to read:
//! one degree of latitude is 111.195 km on a 6371 km sphere.

use chrono::{DateTime, Utc};
use dispatch_core::common::{GeoPoint, PartnerId, RequestId, UserId};
use dispatch_core::domains::dispatch::models::{DispatchRequest, Partner, RequestStatus};

pub const PICKUP: GeoPoint = GeoPoint {
    latitude: 28.60,
    longitude: 77.20,
};

const KM_PER_DEGREE_LAT: f64 = 111.195;

/// A point `km` kilometers north of `origin`
pub fn km_north_of(origin: GeoPoint, km: f64) -> GeoPoint {
    GeoPoint::new(origin.latitude + km / KM_PER_DEGREE_LAT, origin.longitude)
}

fn request(status: RequestStatus, details: serde_json::Value) -> DispatchRequest {
    DispatchRequest::builder()
        .id(RequestId::new())
        .requester_id(UserId::new())
        .origin_location(PICKUP)
        .status(status)
        .details(details)
        .build()
}

/// Ride awaiting a driver
pub fn ride_request() -> DispatchRequest {
    request(
        RequestStatus::Searching,
        serde_json::json!({
            "pickupAddress": "Connaught Place",
            "destinationAddress": "India Gate",
            "destinationLocation": {"latitude": 28.6129, "longitude": 77.2295},
            "fare": 180,
            "riderName": "Meera",
            "riderGender": "female",
            "otp": "4821"
        }),
    )
}

/// Roadside service request awaiting a mechanic
pub fn service_request() -> DispatchRequest {
    request(
        RequestStatus::Pending,
        serde_json::json!({
            "userName": "Kabir",
            "userPhone": "+91 98100 00000",
            "issue": "Flat tyre",
            "otp": "1234"
        }),
    )
}

/// Emergency case awaiting a facility
pub fn emergency_case() -> DispatchRequest {
    request(
        RequestStatus::Pending,
        serde_json::json!({
            "patientName": "S. Rao",
            "emergencyType": "cardiac"
        }),
    )
}

/// Online partner `km` north of the pickup, with a push token
pub fn partner_km_away(km: f64) -> Partner {
    let id = PartnerId::new();
    Partner::builder()
        .id(id)
        .name(format!("Partner {}", id))
        .current_location(km_north_of(PICKUP, km))
        .push_token(format!("ExponentPushToken[{}]", id))
        .last_seen(Utc::now())
        .build()
}

/// Online partner `km` north of the pickup, without a push token
pub fn tokenless_partner_km_away(km: f64) -> Partner {
    Partner {
        push_token: None,
        ..partner_km_away(km)
    }
}

/// Partner whose heartbeat was last seen at `last_seen`
pub fn partner_last_seen(last_seen: DateTime<Utc>) -> Partner {
    Partner {
        last_seen: Some(last_seen),
        ..partner_km_away(1.0)
    }
}

pub fn token_of(partner: &Partner) -> String {
    partner.push_token.clone().unwrap_or_default()
}
