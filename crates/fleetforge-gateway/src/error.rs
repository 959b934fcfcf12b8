use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use fleetforge_core::CellError;
use fleetforge_router::RouterError;
use serde_json::json;

/// Wraps a `CellError` (or a gateway-local condition) with the HTTP status
/// it maps to per the error-kind table, so handlers can just `?` into it.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    #[must_use]
    pub fn rate_limited() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded")
    }
}

impl From<CellError> for ApiError {
    fn from(err: CellError) -> Self {
        let status = match &err {
            CellError::InvalidInput(_) | CellError::CapacityExceeded { .. } => StatusCode::BAD_REQUEST,
            CellError::CellNotFound(_) | CellError::PlayerNotFound(_) => StatusCode::NOT_FOUND,
            CellError::AlreadyExists(_) => StatusCode::CONFLICT,
            CellError::Timeout { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CellError::Conflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            CellError::NotReady { .. } | CellError::ThresholdNotMet(_) | CellError::Transient(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        tracing::warn!(kind = err.kind(), error = %err, "request failed");
        Self { status, message: err.to_string() }
    }
}

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        tracing::warn!(error = %err, "router could not resolve a cell");
        Self::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
