//! Inbound request change events.
//!
//! Whatever owns the request documents (client apps writing through an API, a
//! CDC relay) posts each create/update here. Handlers run the dispatch engine to
//! completion and report what happened.

use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domains::dispatch::models::{DispatchRequest, ServiceKind};
use crate::domains::dispatch::{DispatchError, DispatchOutcome, DispatchTrigger};
use crate::server::app::AppState;

/// Body of an update event
#[derive(Debug, Deserialize)]
pub struct RequestChange {
    pub before: DispatchRequest,
    pub after: DispatchRequest,
}

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub outcomes: Vec<DispatchOutcome>,
}

fn parse_kind(collection: &str) -> Result<ServiceKind, DispatchError> {
    ServiceKind::from_collection(collection)
        .ok_or_else(|| DispatchError::UnknownCollection(collection.to_string()))
}

pub async fn request_created_handler(
    Extension(state): Extension<AppState>,
    Path(collection): Path<String>,
    Json(request): Json<DispatchRequest>,
) -> Result<Json<DispatchResponse>, DispatchError> {
    let kind = parse_kind(&collection)?;
    let outcomes = state
        .engine
        .handle(DispatchTrigger::Created { kind, request })
        .await?;

    Ok(Json(DispatchResponse { outcomes }))
}

pub async fn request_updated_handler(
    Extension(state): Extension<AppState>,
    Path(collection): Path<String>,
    Json(change): Json<RequestChange>,
) -> Result<Json<DispatchResponse>, DispatchError> {
    let kind = parse_kind(&collection)?;

    if change.before.id != change.after.id {
        return Err(DispatchError::InvalidEvent(format!(
            "before ({}) and after ({}) describe different requests",
            change.before.id, change.after.id
        )));
    }

    let outcomes = state
        .engine
        .handle(DispatchTrigger::Updated {
            kind,
            before: change.before,
            after: change.after,
        })
        .await?;

    Ok(Json(DispatchResponse { outcomes }))
}
