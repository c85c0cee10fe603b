//! Push notification content per service kind.
//!
//! Payloads are flat string maps: nested values (locations) are JSON strings,
//! timestamps are epoch milliseconds, numbers are formatted text. Missing
//! request details become empty strings so partner apps always see every key.

use serde_json::Value;

use crate::common::utils::FALLBACK_ADDRESS;
use crate::domains::dispatch::models::DispatchRequest;
use crate::kernel::NotificationData;

/// Title, body and data for one partner notification
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub data: NotificationData,
}

/// Builds the notification for a request sent to a partner `distance_km` away
pub type PayloadBuilder = fn(&DispatchRequest, f64, f64) -> NotificationContent;

/// Distance shown to partners, one decimal
pub fn format_distance(distance_km: f64) -> String {
    format!("{:.1}", distance_km)
}

/// Whole-minute ETA estimate from distance
pub fn eta_minutes(distance_km: f64, multiplier: f64) -> i64 {
    (distance_km * multiplier).round() as i64
}

/// A request detail as a payload string
pub fn detail(request: &DispatchRequest, key: &str) -> String {
    match request.details.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn data<const N: usize>(entries: [(&str, String); N]) -> NotificationData {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

pub fn ride_notification(
    request: &DispatchRequest,
    distance_km: f64,
    eta_multiplier: f64,
) -> NotificationContent {
    let pickup_address = detail(request, "pickupAddress");
    let distance = format_distance(distance_km);

    NotificationContent {
        title: "New Ride Request".to_string(),
        body: format!("Pickup: {} ({} km away)", pickup_address, distance),
        data: data([
            ("type", "new_ride_request".to_string()),
            ("rideId", request.id.to_string()),
            ("pickupAddress", pickup_address.clone()),
            ("destinationAddress", detail(request, "destinationAddress")),
            ("pickupLocation", request.origin_location.to_json_string()),
            ("destinationLocation", detail(request, "destinationLocation")),
            ("createdAt", request.created_at.timestamp_millis().to_string()),
            ("fare", detail(request, "fare")),
            ("rideType", request.service_class.clone().unwrap_or_default()),
            ("status", request.status.to_string()),
            ("riderName", detail(request, "riderName")),
            ("riderId", request.requester_id.to_string()),
            ("riderGender", detail(request, "riderGender")),
            ("otp", detail(request, "otp")),
            ("distance", distance),
            ("eta", eta_minutes(distance_km, eta_multiplier).to_string()),
        ]),
    }
}

pub fn garage_notification(
    request: &DispatchRequest,
    distance_km: f64,
    eta_multiplier: f64,
) -> NotificationContent {
    let issue = detail(request, "issue");
    let distance = format_distance(distance_km);

    NotificationContent {
        title: "New Service Request".to_string(),
        body: format!("{} ({} km away)", issue, distance),
        data: data([
            ("type", "new_service_request".to_string()),
            ("requestId", request.id.to_string()),
            ("userId", request.requester_id.to_string()),
            ("userName", detail(request, "userName")),
            ("userPhone", detail(request, "userPhone")),
            ("issue", issue.clone()),
            ("location", request.origin_location.to_json_string()),
            (
                "locationAddress",
                request
                    .location_address
                    .clone()
                    .unwrap_or_else(|| FALLBACK_ADDRESS.to_string()),
            ),
            ("status", request.status.to_string()),
            ("otp", detail(request, "otp")),
            ("createdAt", request.created_at.timestamp_millis().to_string()),
            ("distance", distance),
            ("eta", eta_minutes(distance_km, eta_multiplier).to_string()),
        ]),
    }
}

pub fn emergency_notification(
    request: &DispatchRequest,
    distance_km: f64,
    eta_multiplier: f64,
) -> NotificationContent {
    let emergency_type = detail(request, "emergencyType");
    let distance = format_distance(distance_km);
    let location_address = request
        .location_address
        .clone()
        .unwrap_or_else(|| detail(request, "locationAddress"));

    NotificationContent {
        title: "Emergency Case".to_string(),
        body: format!("{} emergency ({} km away)", emergency_type, distance),
        data: data([
            ("type", "emergency_case".to_string()),
            ("caseId", request.id.to_string()),
            ("userId", request.requester_id.to_string()),
            ("patientName", detail(request, "patientName")),
            ("emergencyType", emergency_type.clone()),
            ("location", request.origin_location.to_json_string()),
            ("locationAddress", location_address),
            ("status", request.status.to_string()),
            ("createdAt", request.created_at.timestamp_millis().to_string()),
            ("distance", distance),
            ("eta", eta_minutes(distance_km, eta_multiplier).to_string()),
        ]),
    }
}
