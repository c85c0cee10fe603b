use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domains::dispatch::DispatchError;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            DispatchError::UnknownCollection(_) => StatusCode::NOT_FOUND,
            DispatchError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            DispatchError::InternalError(_) => {
                tracing::error!(error = %self, "Dispatch request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
