//! Partner-created and admin hooks. Both only relay to the outbound webhook.

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Deserialize;
use tracing::info;

use crate::domains::dispatch::models::{Partner, ServiceKind};
use crate::kernel::fire_and_forget;
use crate::server::app::AppState;

pub const PARTNER_CREATED_EVENT: &str = "partner.created";
pub const HIGH_DEMAND_EVENT: &str = "admin.simulate_high_demand";

#[derive(Debug, Deserialize)]
pub struct PartnerCreated {
    pub kind: ServiceKind,
    pub partner: Partner,
}

pub async fn partner_created_handler(
    Extension(state): Extension<AppState>,
    Json(event): Json<PartnerCreated>,
) -> StatusCode {
    info!(kind = %event.kind, partner_id = %event.partner.id, "Partner created");

    fire_and_forget(
        state.deps.webhook.clone(),
        PARTNER_CREATED_EVENT,
        serde_json::json!({
            "kind": event.kind,
            "partner": event.partner,
        }),
    );

    StatusCode::ACCEPTED
}

pub async fn simulate_high_demand_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    info!("Simulating high demand");

    fire_and_forget(state.deps.webhook.clone(), HIGH_DEMAND_EVENT, body);

    StatusCode::ACCEPTED
}
