use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;
use std::time::Duration;

use crate::server::app::AppState;

const STORE_PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: StoreHealth,
}

#[derive(Serialize)]
pub struct StoreHealth {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl StoreHealth {
    fn ok() -> Self {
        Self {
            status: "ok",
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        tracing::warn!(error = %error, "Health check: store unavailable");
        Self {
            status: "error",
            error: Some(error),
        }
    }
}

/// Liveness plus document store reachability
///
/// 200 when the store answers a ping within 5s, 503 otherwise.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = match tokio::time::timeout(STORE_PING_TIMEOUT, state.deps.store.ping()).await {
        Ok(Ok(())) => StoreHealth::ok(),
        Ok(Err(e)) => StoreHealth::failed(format!("Query failed: {}", e)),
        Err(_) => StoreHealth::failed("Query timeout (>5s)".to_string()),
    };

    let (code, status) = match database.error {
        None => (StatusCode::OK, "healthy"),
        Some(_) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (code, Json(HealthResponse { status, database }))
}
